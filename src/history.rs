//! Bounded per-iteration record of convergence norms.

use std::ops::{Index, IndexMut};

use nalgebra::{DVector, RealField};
use num_traits::Zero;

/// Fixed-capacity buffer of the norms recorded at each iteration.
///
/// The buffer is always exactly `2 * budget` entries long for the currently
/// configured iteration budget: indices `[0, budget)` hold the
/// displacement-norm of each iteration and `[budget, 2 * budget)` the
/// residual-norm at the same offset. Only entries for iterations that have
/// actually run are meaningful; the rest stay at zero after a reset.
#[derive(Debug, Clone)]
pub struct History<T: RealField + Copy> {
    norms: DVector<T>,
    budget: usize,
}

impl<T: RealField + Copy> History<T> {
    /// Allocates a zeroed buffer for the given iteration budget.
    pub fn new(budget: usize) -> Self {
        assert!(budget > 0, "iteration budget must be positive");

        Self {
            norms: DVector::zeros(2 * budget),
            budget,
        }
    }

    /// The iteration budget this buffer is sized for.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Total number of entries, always `2 * budget`.
    pub fn len(&self) -> usize {
        self.norms.len()
    }

    /// Whether the buffer has no entries. Never true under the
    /// positive-budget invariant.
    pub fn is_empty(&self) -> bool {
        self.norms.is_empty()
    }

    /// Zeroes all entries, keeping the capacity.
    pub fn clear(&mut self) {
        self.norms.fill(T::zero());
    }

    /// Reallocates the buffer, zeroed, for a new iteration budget.
    pub fn resize(&mut self, budget: usize) {
        assert!(budget > 0, "iteration budget must be positive");

        self.norms = DVector::zeros(2 * budget);
        self.budget = budget;
    }

    /// Records both norms for the given 1-based iteration.
    ///
    /// Writes beyond the budget are skipped, not an error: a criterion keeps
    /// counting iterations past its budget in some configurations, while the
    /// buffer stays fixed.
    pub fn record(&mut self, iteration: usize, displacement: T, unbalance: T) {
        if iteration == 0 || iteration > self.budget {
            return;
        }

        self.norms[iteration - 1] = displacement;
        self.norms[self.budget + iteration - 1] = unbalance;
    }

    /// The displacement-norm half of the buffer.
    pub fn displacements(&self) -> &[T] {
        &self.norms.as_slice()[..self.budget]
    }

    /// The residual-norm half of the buffer.
    pub fn residuals(&self) -> &[T] {
        &self.norms.as_slice()[self.budget..]
    }

    /// The whole buffer as a flat slice.
    pub fn as_slice(&self) -> &[T] {
        self.norms.as_slice()
    }
}

impl<T: RealField + Copy> Index<usize> for History<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.norms[index]
    }
}

impl<T: RealField + Copy> IndexMut<usize> for History<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.norms[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sized_for_twice_the_budget() {
        let history = History::<f64>::new(4);

        assert_eq!(history.len(), 8);
        assert_eq!(history.budget(), 4);
        assert!(history.as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn records_both_halves_at_the_same_offset() {
        let mut history = History::new(3);
        history.record(1, 5.0, 50.0);
        history.record(3, 1.0, 10.0);

        assert_eq!(history.displacements(), &[5.0, 0.0, 1.0]);
        assert_eq!(history.residuals(), &[50.0, 0.0, 10.0]);
        assert_eq!(history[0], 5.0);
        assert_eq!(history[5], 10.0);
    }

    #[test]
    fn skips_writes_beyond_the_budget() {
        let mut history = History::new(2);
        history.record(3, 9.0, 9.0);
        history.record(0, 9.0, 9.0);

        assert!(history.as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut history = History::new(2);
        history.record(1, 5.0, 50.0);
        history.clear();

        assert_eq!(history.len(), 4);
        assert!(history.as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn resize_reallocates_zeroed() {
        let mut history = History::new(2);
        history.record(1, 5.0, 50.0);
        history.resize(5);

        assert_eq!(history.len(), 10);
        assert_eq!(history.budget(), 5);
        assert!(history.as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    #[should_panic(expected = "iteration budget must be positive")]
    fn rejects_zero_budget() {
        History::<f64>::new(0);
    }
}
