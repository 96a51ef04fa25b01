//! Scripted linear systems and channels useful for testing convergence
//! criteria and the algorithms driving them.

#![allow(unused)]

use std::cell::Cell;

use nalgebra::{DVector, Dyn, OVector, RealField};

use crate::checkpoint::{Channel, ChannelError, CheckpointTag};
use crate::core::LinearSystem;

/// A [`LinearSystem`] that replays a fixed script of (increment, residual)
/// pairs.
///
/// A real driving algorithm refreshes the linear system between calls to a
/// criterion's `test`; tests emulate that by calling
/// [`advance`](ScriptedSystem::advance). The cursor saturates at the last
/// entry, so a single-entry script behaves as a constant system.
pub struct ScriptedSystem {
    increments: Vec<DVector<f64>>,
    residuals: Vec<DVector<f64>>,
    cursor: Cell<usize>,
}

impl ScriptedSystem {
    /// Creates a system replaying the given steps.
    pub fn new(steps: Vec<(DVector<f64>, DVector<f64>)>) -> Self {
        assert!(!steps.is_empty(), "script must have at least one step");

        let (increments, residuals) = steps.into_iter().unzip();

        Self {
            increments,
            residuals,
            cursor: Cell::new(0),
        }
    }

    /// Creates a system that always returns the same pair of vectors.
    pub fn constant(increment: DVector<f64>, residual: DVector<f64>) -> Self {
        Self::new(vec![(increment, residual)])
    }

    /// Moves to the next scripted step, as a driving algorithm would after
    /// re-solving the linear system.
    pub fn advance(&self) {
        let next = (self.cursor.get() + 1).min(self.increments.len() - 1);
        self.cursor.set(next);
    }
}

impl LinearSystem for ScriptedSystem {
    type Field = f64;

    fn solution_increment(&self) -> &OVector<f64, Dyn> {
        &self.increments[self.cursor.get()]
    }

    fn residual(&self) -> &OVector<f64, Dyn> {
        &self.residuals[self.cursor.get()]
    }
}

/// A [`Channel`] whose transport always fails, for exercising checkpoint
/// fallback paths.
pub struct FailingChannel;

impl<T: RealField + Copy> Channel<T> for FailingChannel {
    fn send_vector(&mut self, _tag: CheckpointTag, _data: &DVector<T>) -> Result<(), ChannelError> {
        Err(ChannelError::Transport("link down".into()))
    }

    fn recv_vector(
        &mut self,
        _tag: CheckpointTag,
        _data: &mut DVector<T>,
    ) -> Result<(), ChannelError> {
        Err(ChannelError::Transport("link down".into()))
    }
}
