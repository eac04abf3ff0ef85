use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use miette::Result;
use rayon::prelude::*;

use crate::fraction::Fraction;
use crate::matrix::RationalMatrix;

/// Default cap on the value any single free variable may take during the
/// search. Raise per machine with [`SearchProblem::with_limit`] if an input
/// legitimately needs more presses on one button.
pub const DEFAULT_FREE_VALUE_LIMIT: u64 = 1000;

/// Best total found so far, shared by every branch and worker attacking one
/// machine. Updates are monotone decreasing, so a relaxed `fetch_min` is
/// all the synchronization needed.
struct SharedBest(AtomicU64);

impl SharedBest {
    fn new() -> Self {
        Self(AtomicU64::new(u64::MAX))
    }

    fn current(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn offer(&self, candidate: u64) {
        self.0.fetch_min(candidate, Ordering::Relaxed);
    }
}

/// Read-only working set distilled from a reduced matrix: per pivot row,
/// the right-hand side and the coefficient of every free variable.
#[derive(Debug)]
pub struct SearchProblem {
    rhs: Vec<Fraction>,
    free_coeff: Vec<Vec<Fraction>>,
    free_count: usize,
    limit: u64,
}

impl SearchProblem {
    /// The matrix must already be reduced and consistent.
    pub fn from_matrix(matrix: &RationalMatrix) -> Self {
        let free_cols = matrix.free_columns();
        let pivot_rows = matrix.pivot_row_count();

        let rhs = (0..pivot_rows).map(|r| matrix.rhs(r)).collect();
        let free_coeff = (0..pivot_rows)
            .map(|r| free_cols.iter().map(|&c| matrix.entry(r, c)).collect())
            .collect();

        Self {
            rhs,
            free_coeff,
            free_count: free_cols.len(),
            limit: DEFAULT_FREE_VALUE_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Derives every pivot variable for the given free-variable assignment
    /// in exact rational arithmetic. Returns the summed pivot values, or
    /// `None` when any pivot fails the non-negative-integer requirement.
    fn back_substitute(&self, assigned: &[u64]) -> Result<Option<u64>> {
        let mut total = 0_u64;
        for (rhs, coeffs) in self.rhs.iter().zip(&self.free_coeff) {
            let mut value = *rhs;
            for (coeff, &presses) in coeffs.iter().zip(assigned) {
                if presses == 0 || coeff.is_zero() {
                    continue;
                }
                value = value.subtract(coeff.multiply(Fraction::from_integer(presses as i64))?)?;
            }
            if !value.is_integer() || value.is_negative() {
                return Ok(None);
            }
            total += value.numerator() as u64;
        }
        Ok(Some(total))
    }
}

/// Depth-first assignment of non-negative integers to the free variables,
/// pruned against the shared best total. Recursion depth equals the free
/// variable count; the per-variable value loops are iterative.
struct FreeVariableSearch<'a> {
    problem: &'a SearchProblem,
    best: &'a SharedBest,
    assigned: Vec<u64>,
}

impl<'a> FreeVariableSearch<'a> {
    fn new(problem: &'a SearchProblem, best: &'a SharedBest) -> Self {
        Self {
            problem,
            best,
            assigned: vec![0; problem.free_count],
        }
    }

    fn run(&mut self, depth: usize, partial_sum: u64) -> Result<()> {
        let best = self.best.current();
        if best == 0 || partial_sum >= best {
            return Ok(());
        }

        if depth == self.problem.free_count {
            if let Some(pivot_total) = self.problem.back_substitute(&self.assigned)? {
                self.best.offer(partial_sum + pivot_total);
            }
            return Ok(());
        }

        for value in 0..=self.problem.limit {
            // Re-read the shared best each step; other workers shrink it.
            let best = self.best.current();
            if best == 0 || partial_sum + value >= best {
                break; // the partial sum only grows from here
            }
            self.assigned[depth] = value;
            self.run(depth + 1, partial_sum + value)?;
        }
        Ok(())
    }
}

/// Minimum total presses for a reduced, consistent system, or `None` when
/// no feasible assignment exists within the bounded search space.
///
/// The first free variable's range is split into one contiguous chunk per
/// worker thread; every chunk runs an independent search from depth 1
/// against the shared best. The join is blocking: no chunk is abandoned
/// unless the shared best reaches 0, which is globally minimal.
pub fn minimum_total_presses(problem: &SearchProblem) -> Result<Option<u64>> {
    if problem.free_count == 0 {
        return problem.back_substitute(&[]);
    }

    let best = SharedBest::new();
    let chunks = partition_range(problem.limit + 1, rayon::current_num_threads());

    chunks.into_par_iter().try_for_each(|chunk| -> Result<()> {
        let mut search = FreeVariableSearch::new(problem, &best);
        for value in chunk {
            let current = best.current();
            if current == 0 || value >= current {
                break;
            }
            search.assigned[0] = value;
            search.run(1, value)?;
        }
        Ok(())
    })?;

    let found = best.current();
    Ok((found != u64::MAX).then_some(found))
}

fn partition_range(len: u64, parts: usize) -> Vec<Range<u64>> {
    let parts = (parts.max(1) as u64).min(len.max(1));
    let chunk = len.div_ceil(parts).max(1);
    (0..parts)
        .map(|i| (i * chunk).min(len)..((i + 1) * chunk).min(len))
        .filter(|range| !range.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn solve(targets: &[i64], buttons: &[Vec<usize>], limit: u64) -> Option<u64> {
        let mut matrix = RationalMatrix::from_buttons(targets, buttons).unwrap();
        if !matrix.reduce().unwrap() {
            return None;
        }
        let problem = SearchProblem::from_matrix(&matrix).with_limit(limit);
        minimum_total_presses(&problem).unwrap()
    }

    /// Enumerates every press-count vector up to `limit` per button.
    fn exhaustive_minimum(targets: &[i64], buttons: &[Vec<usize>], limit: u64) -> Option<u64> {
        fn recurse(
            targets: &[i64],
            buttons: &[Vec<usize>],
            presses: &mut Vec<u64>,
            limit: u64,
            best: &mut Option<u64>,
        ) {
            if presses.len() == buttons.len() {
                let mut sums = vec![0_i64; targets.len()];
                for (button, &count) in buttons.iter().zip(presses.iter()) {
                    for &row in button {
                        sums[row] += count as i64;
                    }
                }
                if sums == targets {
                    let total: u64 = presses.iter().sum();
                    *best = Some(best.map_or(total, |b| b.min(total)));
                }
                return;
            }
            for value in 0..=limit {
                presses.push(value);
                recurse(targets, buttons, presses, limit, best);
                presses.pop();
            }
        }

        let mut best = None;
        recurse(targets, buttons, &mut Vec::new(), limit, &mut best);
        best
    }

    #[test]
    fn single_counter_with_two_buttons_costs_its_target() {
        // Any split of six presses across the two buttons totals six.
        assert_eq!(solve(&[6], &[vec![0], vec![0]], 1000), Some(6));
    }

    #[test]
    fn inconsistent_system_is_unreachable() {
        assert_eq!(solve(&[1, 2], &[vec![0, 1]], 1000), None);
    }

    #[test]
    fn negative_pivot_values_are_infeasible() {
        // x0 + x1 = 1 and x1 = 2 forces x0 = -1.
        assert_eq!(solve(&[1, 2], &[vec![0], vec![0, 1]], 1000), None);
    }

    #[test]
    fn zero_target_needs_zero_presses() {
        assert_eq!(solve(&[0, 0], &[vec![0], vec![0, 1]], 1000), Some(0));
    }

    #[rstest]
    #[case(&[4, 6], vec![vec![0], vec![1], vec![0, 1]], 10)]
    #[case(&[2, 3, 5], vec![vec![0, 1], vec![1, 2], vec![0, 2]], 8)]
    #[case(&[5, 5], vec![vec![0], vec![0, 1]], 8)]
    #[case(&[3, 7], vec![vec![0, 1], vec![1]], 10)]
    fn matches_exhaustive_enumeration(
        #[case] targets: &[i64],
        #[case] buttons: Vec<Vec<usize>>,
        #[case] limit: u64,
    ) {
        assert_eq!(
            solve(targets, &buttons, limit),
            exhaustive_minimum(targets, &buttons, limit)
        );
    }

    #[test]
    fn repeated_runs_agree() {
        let targets = [7_i64, 5, 12, 7, 2];
        let buttons = vec![
            vec![0, 2, 3, 4],
            vec![2, 3],
            vec![0, 4],
            vec![0, 1, 2],
            vec![1, 2, 3, 4],
        ];
        let first = solve(&targets, &buttons, 1000);
        let second = solve(&targets, &buttons, 1000);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn partitions_cover_the_range_exactly() {
        for len in 1..=20_u64 {
            for parts in 1..=8 {
                let ranges = partition_range(len, parts);
                let mut expected = 0;
                for range in &ranges {
                    assert_eq!(range.start, expected);
                    expected = range.end;
                }
                assert_eq!(expected, len);
            }
        }
    }
}
