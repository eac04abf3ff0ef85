use miette::{bail, Result};

use crate::fraction::Fraction;

/// Augmented coefficient matrix `[A | b]` over exact rationals.
///
/// Entries live in a single flat row-major buffer; the last column is the
/// right-hand side. `reduce` brings the matrix to reduced row-echelon form
/// and records which columns carry pivots; after that the matrix is only
/// queried.
#[derive(Debug, Clone)]
pub struct RationalMatrix {
    rows: usize,
    cols: usize,
    data: Vec<Fraction>,
    pivot_col_for_row: Vec<Option<usize>>,
    is_pivot_col: Vec<bool>,
    pivot_row_count: usize,
}

impl RationalMatrix {
    /// Builds the linear system for a counter machine: button `c`
    /// contributes a coefficient of 1 in every row it increments, and the
    /// target values form the right-hand side.
    pub fn from_buttons(targets: &[i64], buttons: &[Vec<usize>]) -> Result<Self> {
        let rows = targets.len();
        let cols = buttons.len();

        if cols == 0 && targets.iter().any(|&t| t != 0) {
            bail!("malformed machine: no buttons but a non-zero target");
        }

        let width = cols + 1;
        let mut data = vec![Fraction::ZERO; rows * width];
        for (c, button) in buttons.iter().enumerate() {
            for &r in button {
                if r >= rows {
                    bail!(
                        "malformed machine: button increments counter {r} \
                         but the machine only has {rows}"
                    );
                }
                data[r * width + c] = Fraction::ONE;
            }
        }
        for (r, &target) in targets.iter().enumerate() {
            data[r * width + cols] = Fraction::from_integer(target);
        }

        Ok(Self {
            rows,
            cols,
            data,
            pivot_col_for_row: vec![None; rows],
            is_pivot_col: vec![false; cols],
            pivot_row_count: 0,
        })
    }

    #[inline]
    pub fn entry(&self, row: usize, col: usize) -> Fraction {
        self.data[row * (self.cols + 1) + col]
    }

    #[inline]
    fn set(&mut self, row: usize, col: usize, value: Fraction) {
        self.data[row * (self.cols + 1) + col] = value;
    }

    /// Right-hand side of a row (the augmented column).
    pub fn rhs(&self, row: usize) -> Fraction {
        self.entry(row, self.cols)
    }

    pub fn column_count(&self) -> usize {
        self.cols
    }

    pub fn pivot_row_count(&self) -> usize {
        self.pivot_row_count
    }

    pub fn pivot_col_for_row(&self) -> &[Option<usize>] {
        &self.pivot_col_for_row
    }

    /// Columns that never received a pivot, in ascending order.
    pub fn free_columns(&self) -> Vec<usize> {
        (0..self.cols).filter(|&c| !self.is_pivot_col[c]).collect()
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let width = self.cols + 1;
        for k in 0..width {
            self.data.swap(a * width + k, b * width + k);
        }
    }

    /// Gauss-Jordan elimination to reduced row-echelon form.
    ///
    /// Returns `Ok(false)` when the system is inconsistent, i.e. some row
    /// beyond the last pivot keeps a non-zero right-hand side.
    pub fn reduce(&mut self) -> Result<bool> {
        let mut pivot_row = 0;

        for c in 0..self.cols {
            if pivot_row >= self.rows {
                break; // every remaining column stays free
            }

            let Some(found) = (pivot_row..self.rows).find(|&r| !self.entry(r, c).is_zero())
            else {
                continue;
            };
            self.swap_rows(pivot_row, found);

            // Normalize the pivot row; entries left of `c` are already zero.
            let pivot = self.entry(pivot_row, c);
            for k in c..=self.cols {
                let value = self.entry(pivot_row, k).divide(pivot)?;
                self.set(pivot_row, k, value);
            }

            // Eliminate column `c` from every other row.
            for r in 0..self.rows {
                if r == pivot_row {
                    continue;
                }
                let factor = self.entry(r, c);
                if factor.is_zero() {
                    continue;
                }
                for k in c..=self.cols {
                    let value = self
                        .entry(r, k)
                        .subtract(factor.multiply(self.entry(pivot_row, k))?)?;
                    self.set(r, k, value);
                }
            }

            self.pivot_col_for_row[pivot_row] = Some(c);
            self.is_pivot_col[c] = true;
            pivot_row += 1;
        }

        self.pivot_row_count = pivot_row;

        for r in pivot_row..self.rows {
            if !self.rhs(r).is_zero() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
