use std::fmt;

use miette::{bail, Result};
use num_integer::Integer;

/// Exact rational number, always in lowest terms with a positive
/// denominator.
///
/// Arithmetic widens to 128 bits, reduces by the gcd, and narrows back to
/// 64 bits. A reduced value that no longer fits is surfaced as an error
/// instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fraction {
    numerator: i64,
    denominator: i64,
}

impl Fraction {
    pub const ZERO: Fraction = Fraction {
        numerator: 0,
        denominator: 1,
    };

    pub const ONE: Fraction = Fraction {
        numerator: 1,
        denominator: 1,
    };

    /// Builds a fraction from a raw numerator/denominator pair, normalizing
    /// the sign onto the numerator and reducing by the gcd.
    pub fn new(numerator: i64, denominator: i64) -> Result<Self> {
        if denominator == 0 {
            bail!("fraction denominator must be non-zero");
        }
        Self::reduce_wide(numerator as i128, denominator as i128)
    }

    pub const fn from_integer(value: i64) -> Self {
        Fraction {
            numerator: value,
            denominator: 1,
        }
    }

    /// Reduces a widened intermediate and narrows it back to 64 bits.
    fn reduce_wide(numerator: i128, denominator: i128) -> Result<Self> {
        debug_assert!(denominator != 0);
        let sign = if denominator < 0 { -1 } else { 1 };
        let numerator = numerator * sign;
        let denominator = denominator * sign;

        let g = numerator.unsigned_abs().gcd(&denominator.unsigned_abs()) as i128;
        let numerator = numerator / g;
        let denominator = denominator / g;

        match (i64::try_from(numerator), i64::try_from(denominator)) {
            (Ok(numerator), Ok(denominator)) => Ok(Fraction {
                numerator,
                denominator,
            }),
            _ => bail!("rational arithmetic overflowed 64 bits: {numerator}/{denominator}"),
        }
    }

    pub fn add(self, other: Fraction) -> Result<Self> {
        Self::reduce_wide(
            self.numerator as i128 * other.denominator as i128
                + other.numerator as i128 * self.denominator as i128,
            self.denominator as i128 * other.denominator as i128,
        )
    }

    pub fn subtract(self, other: Fraction) -> Result<Self> {
        Self::reduce_wide(
            self.numerator as i128 * other.denominator as i128
                - other.numerator as i128 * self.denominator as i128,
            self.denominator as i128 * other.denominator as i128,
        )
    }

    pub fn multiply(self, other: Fraction) -> Result<Self> {
        Self::reduce_wide(
            self.numerator as i128 * other.numerator as i128,
            self.denominator as i128 * other.denominator as i128,
        )
    }

    /// Division by a zero fraction is an internal invariant violation
    /// (pivot selection must skip all-zero columns) and is surfaced rather
    /// than coerced.
    pub fn divide(self, other: Fraction) -> Result<Self> {
        if other.is_zero() {
            bail!("division by a zero fraction");
        }
        Self::reduce_wide(
            self.numerator as i128 * other.denominator as i128,
            self.denominator as i128 * other.numerator as i128,
        )
    }

    pub const fn is_zero(&self) -> bool {
        self.numerator == 0
    }

    /// Whether the reduced form is a whole number.
    pub const fn is_integer(&self) -> bool {
        self.denominator == 1
    }

    pub const fn is_negative(&self) -> bool {
        self.numerator < 0
    }

    pub const fn numerator(&self) -> i64 {
        self.numerator
    }

    pub const fn denominator(&self) -> i64 {
        self.denominator
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(6, -4, -3, 2)]
    #[case(-6, -4, 3, 2)]
    #[case(0, 7, 0, 1)]
    #[case(12, 8, 3, 2)]
    #[case(5, 1, 5, 1)]
    fn construction_reduces_and_normalizes_sign(
        #[case] n: i64,
        #[case] d: i64,
        #[case] expected_n: i64,
        #[case] expected_d: i64,
    ) -> Result<()> {
        let f = Fraction::new(n, d)?;
        assert_eq!(f.numerator(), expected_n);
        assert_eq!(f.denominator(), expected_d);
        Ok(())
    }

    #[test]
    fn constructed_fractions_are_in_lowest_terms() -> Result<()> {
        for n in -12..=12 {
            for d in 1..=12 {
                let f = Fraction::new(n, d)?;
                assert!(f.denominator() > 0);
                if !f.is_zero() {
                    assert_eq!(
                        f.numerator().unsigned_abs().gcd(&f.denominator().unsigned_abs()),
                        1,
                        "{n}/{d} reduced to {f}"
                    );
                }
            }
        }
        Ok(())
    }

    #[rstest]
    #[case(1, 2, 3, 4)]
    #[case(-7, 3, 2, 5)]
    #[case(10, 4, -1, 6)]
    #[case(0, 1, 9, 7)]
    fn divide_then_multiply_round_trips(
        #[case] an: i64,
        #[case] ad: i64,
        #[case] bn: i64,
        #[case] bd: i64,
    ) -> Result<()> {
        let a = Fraction::new(an, ad)?;
        let b = Fraction::new(bn, bd)?;
        assert_eq!(a.divide(b)?.multiply(b)?, a);
        Ok(())
    }

    #[test]
    fn arithmetic_stays_exact() -> Result<()> {
        let third = Fraction::new(1, 3)?;
        let sixth = Fraction::new(1, 6)?;
        assert_eq!(third.add(sixth)?, Fraction::new(1, 2)?);
        assert_eq!(third.subtract(sixth)?, sixth);
        assert_eq!(third.multiply(sixth)?, Fraction::new(1, 18)?);
        assert!(Fraction::new(3, 1)?.is_integer());
        assert!(!third.is_integer());
        Ok(())
    }

    #[test]
    fn zero_denominator_is_rejected() {
        assert!(Fraction::new(1, 0).is_err());
    }

    #[test]
    fn division_by_zero_fraction_is_an_error() {
        let a = Fraction::from_integer(3);
        assert!(a.divide(Fraction::ZERO).is_err());
    }

    #[test]
    fn overflow_is_surfaced_not_wrapped() {
        let huge = Fraction::from_integer(i64::MAX);
        assert!(huge.multiply(Fraction::from_integer(2)).is_err());
        assert!(huge.add(Fraction::from_integer(1)).is_err());
    }

    #[test]
    fn wide_intermediates_avoid_spurious_overflow() -> Result<()> {
        // Cross-multiplication exceeds 64 bits but the reduced result fits.
        let a = Fraction::new(i64::MAX, 2)?;
        assert_eq!(a.divide(a)?, Fraction::ONE);
        Ok(())
    }
}
