/// Reason why a criterion could not reach a decision.
///
/// Hosting frameworks traditionally collapse all of these into a single `-2`
/// control code. The variants are kept distinct here because they call for
/// different reactions: the first two are call-order mistakes the driving
/// algorithm can correct, the last two are genuine outcomes of the iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stall {
    /// `test` was invoked before a linear system was bound.
    Unbound,
    /// `test` was invoked before `start`.
    NotStarted,
    /// The iteration budget was exhausted without meeting the tolerances.
    BudgetExhausted,
    /// The norms grew for too many successive iterations.
    Diverged,
}

/// Outcome of one call to [`ConvergenceTest::test`](super::ConvergenceTest::test).
///
/// Every outcome is a value the caller inspects; criteria never panic or
/// return `Err` from the decision path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Not converged yet, within budget. Run another iteration.
    Continue,
    /// No decision could be made; see [`Stall`] for the reason.
    NotReady(Stall),
    /// Converged at the contained iteration count. This includes the
    /// degraded accept-anyway outcome on budget exhaustion when the
    /// criterion is configured for it.
    Converged(usize),
}

impl Status {
    /// The signed-integer control code used by hosting frameworks: negative
    /// means not-yet-successful, non-negative is the iteration count at which
    /// convergence was declared.
    pub fn code(self) -> i64 {
        match self {
            Status::Continue => -1,
            Status::NotReady(_) => -2,
            Status::Converged(n) => n as i64,
        }
    }

    /// Whether this outcome declares convergence.
    pub fn is_converged(self) -> bool {
        matches!(self, Status::Converged(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_framework_convention() {
        assert_eq!(Status::Continue.code(), -1);
        assert_eq!(Status::NotReady(Stall::NotStarted).code(), -2);
        assert_eq!(Status::NotReady(Stall::BudgetExhausted).code(), -2);
        assert_eq!(Status::Converged(0).code(), 0);
        assert_eq!(Status::Converged(7).code(), 7);
    }

    #[test]
    fn convergence_predicate() {
        assert!(Status::Converged(3).is_converged());
        assert!(!Status::Continue.is_converged());
        assert!(!Status::NotReady(Stall::Unbound).is_converged());
    }
}
