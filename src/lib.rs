#![warn(missing_docs)]

//! # Converge
//!
//! Convergence criteria for iterative nonlinear equation solvers, written
//! entirely in Rust.
//!
//! A nonlinear solving algorithm repeatedly updates a trial solution and
//! re-assembles a linear system whose solution is the next correction. After
//! every iteration it has to decide: has the process converged, should it keep
//! going, or has it run out of budget? This crate provides that decision as a
//! pluggable *convergence criterion* object with a uniform interface, a
//! bounded history of the norms seen so far, and a checkpoint protocol for
//! persisting and restoring solver state mid-run.
//!
//! ## Criteria
//!
//! * [`NormDispOrUnbalance`](criteria::disp_or_unbalance) -- Accepts the step
//!   when *either* the solution-increment norm or the residual norm is within
//!   its tolerance. Recommended default.
//! * [`NormDispAndUnbalance`](criteria::disp_and_unbalance) -- Requires *both*
//!   norms to be within tolerance and can additionally detect divergence from
//!   sustained norm growth.
//!
//! ## Usage
//!
//! The driving algorithm exposes its linear system through the
//! [`LinearSystem`] trait, binds a criterion to it, calls
//! [`start`](ConvergenceTest::start) once per nonlinear step and then
//! [`test`](ConvergenceTest::test) once per iteration until a terminal
//! [`Status`] is returned.
//!
//! ```rust
//! use converge::nalgebra as na;
//! use converge::{ConvergenceTest, LinearSystem, NormDispOrUnbalance, Status};
//! use na::{DVector, Dyn, OVector};
//!
//! // The solver owns the linear system; the criterion only borrows it.
//! struct Workspace {
//!     dx: DVector<f64>,
//!     r: DVector<f64>,
//! }
//!
//! impl LinearSystem for Workspace {
//!     type Field = f64;
//!
//!     fn solution_increment(&self) -> &OVector<f64, Dyn> {
//!         &self.dx
//!     }
//!
//!     fn residual(&self) -> &OVector<f64, Dyn> {
//!         &self.r
//!     }
//! }
//!
//! let workspace = Workspace {
//!     dx: DVector::from_vec(vec![1e-10, 0.0]),
//!     r: DVector::from_vec(vec![0.5, 0.5]),
//! };
//!
//! let mut criterion = NormDispOrUnbalance::new();
//! criterion.bind(&workspace).unwrap();
//! criterion.start().unwrap();
//!
//! // The increment norm is already below the default tolerance.
//! assert_eq!(criterion.test(), Status::Converged(1));
//! ```
//!
//! All outcomes of `test` are values of the closed [`Status`] set; no
//! exceptions, no panics. See [`Status::code`] for the signed-integer
//! convention used by hosting frameworks.
//!
//! ## Checkpointing
//!
//! Criteria persist their configuration as a fixed-length record of scalars
//! through a [`Channel`](checkpoint::Channel) and can be reconstructed from a
//! checkpoint via the [`Criterion`] registry, including a documented fallback
//! configuration when the transport fails on restore.
//!
//! ## License
//!
//! Licensed under MIT.

pub mod checkpoint;
mod core;
pub mod criteria;
pub mod history;
pub mod report;

pub use crate::core::*;
pub use criteria::{Criterion, CriterionKind, NormDispAndUnbalance, NormDispOrUnbalance};

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;
