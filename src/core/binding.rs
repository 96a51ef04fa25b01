use nalgebra::{Dyn, OVector, RealField};

/// View of the linear system owned by the driving algorithm.
///
/// A convergence criterion never owns or mutates the system of equations. It
/// only queries the two vectors produced by the most recent linear solve: the
/// solution increment (the correction applied to the unknowns) and the
/// residual (the remaining imbalance). The driving algorithm refreshes both
/// between calls to [`ConvergenceTest::test`](super::ConvergenceTest::test).
pub trait LinearSystem {
    /// Type of the scalar, usually f32 or f64.
    type Field: RealField + Copy;

    /// The correction computed by the last linear solve.
    fn solution_increment(&self) -> &OVector<Self::Field, Dyn>;

    /// The current residual of the nonlinear system.
    fn residual(&self) -> &OVector<Self::Field, Dyn>;

    /// Reduces a vector to a single convergence-comparable scalar.
    ///
    /// The default is the plain p-norm of the given order. Implementors can
    /// override this, for example to apply per-degree-of-freedom weighting.
    fn p_norm(&self, v: &OVector<Self::Field, Dyn>, order: i32) -> Self::Field {
        v.lp_norm(order)
    }
}
