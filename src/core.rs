//! Core abstractions and types for Converge.
//!
//! *Solver authors* are mainly interested in implementing the [`LinearSystem`]
//! trait for their iteration workspace and driving a criterion through the
//! [`ConvergenceTest`] trait.
//!
//! Criteria *developers* implement [`ConvergenceTest`] and register the new
//! variant in the [`Criterion`](crate::criteria::Criterion) registry so that
//! it can be reconstructed from checkpoints.

mod binding;
mod status;

pub use binding::*;
pub use status::*;
pub use test::*;
