//! The collection of implemented convergence criteria.

pub mod disp_and_unbalance;
pub mod disp_or_unbalance;

pub use disp_and_unbalance::NormDispAndUnbalance;
pub use disp_or_unbalance::NormDispOrUnbalance;

use crate::checkpoint::{Channel, ChannelError, CheckpointTag};
use crate::core::{BindError, ConvergenceTest, LinearSystem, NotBoundError, Status};
use crate::history::History;

/// Tag identifying a criterion variant.
///
/// Stored alongside checkpoints by the persisting layer so that
/// [`Criterion::from_checkpoint`] can rebuild the right variant without any
/// runtime type discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CriterionKind {
    /// [`NormDispOrUnbalance`].
    DispOrUnbalance,
    /// [`NormDispAndUnbalance`].
    DispAndUnbalance,
}

/// A criterion variant selected at configuration time.
///
/// Dispatches the whole [`ConvergenceTest`] contract to the contained
/// variant, letting the driving algorithm hold any criterion as one concrete
/// type.
#[derive(Debug)]
pub enum Criterion<'sys, S: LinearSystem> {
    /// OR-combined dual-norm criterion.
    DispOrUnbalance(NormDispOrUnbalance<'sys, S>),
    /// AND-combined dual-norm criterion.
    DispAndUnbalance(NormDispAndUnbalance<'sys, S>),
}

impl<'sys, S: LinearSystem> Criterion<'sys, S> {
    /// Creates the given variant with its default options.
    pub fn new(kind: CriterionKind) -> Self {
        match kind {
            CriterionKind::DispOrUnbalance => {
                Criterion::DispOrUnbalance(NormDispOrUnbalance::new())
            }
            CriterionKind::DispAndUnbalance => {
                Criterion::DispAndUnbalance(NormDispAndUnbalance::new())
            }
        }
    }

    /// The tag of the contained variant.
    pub fn kind(&self) -> CriterionKind {
        match self {
            Criterion::DispOrUnbalance(_) => CriterionKind::DispOrUnbalance,
            Criterion::DispAndUnbalance(_) => CriterionKind::DispAndUnbalance,
        }
    }

    /// Rebuilds a criterion of the given kind from a checkpoint.
    ///
    /// A transport failure is propagated; the caller can still fall back to
    /// [`Criterion::new`] for the default configuration.
    pub fn from_checkpoint(
        kind: CriterionKind,
        tag: CheckpointTag,
        channel: &mut dyn Channel<S::Field>,
    ) -> Result<Self, ChannelError> {
        let mut criterion = Self::new(kind);
        criterion.restore(tag, channel)?;
        Ok(criterion)
    }
}

impl<'sys, S: LinearSystem> ConvergenceTest<'sys, S> for Criterion<'sys, S> {
    const NAME: &'static str = "Criterion";

    fn name(&self) -> &'static str {
        match self {
            Criterion::DispOrUnbalance(c) => c.name(),
            Criterion::DispAndUnbalance(c) => c.name(),
        }
    }

    fn bind(&mut self, system: &'sys S) -> Result<(), BindError> {
        match self {
            Criterion::DispOrUnbalance(c) => c.bind(system),
            Criterion::DispAndUnbalance(c) => c.bind(system),
        }
    }

    fn start(&mut self) -> Result<(), NotBoundError> {
        match self {
            Criterion::DispOrUnbalance(c) => c.start(),
            Criterion::DispAndUnbalance(c) => c.start(),
        }
    }

    fn test(&mut self) -> Status {
        match self {
            Criterion::DispOrUnbalance(c) => c.test(),
            Criterion::DispAndUnbalance(c) => c.test(),
        }
    }

    fn num_tests(&self) -> usize {
        match self {
            Criterion::DispOrUnbalance(c) => c.num_tests(),
            Criterion::DispAndUnbalance(c) => c.num_tests(),
        }
    }

    fn max_num_tests(&self) -> usize {
        match self {
            Criterion::DispOrUnbalance(c) => c.max_num_tests(),
            Criterion::DispAndUnbalance(c) => c.max_num_tests(),
        }
    }

    fn ratio_num_to_max(&self) -> S::Field {
        match self {
            Criterion::DispOrUnbalance(c) => c.ratio_num_to_max(),
            Criterion::DispAndUnbalance(c) => c.ratio_num_to_max(),
        }
    }

    fn history(&self) -> &History<S::Field> {
        match self {
            Criterion::DispOrUnbalance(c) => c.history(),
            Criterion::DispAndUnbalance(c) => c.history(),
        }
    }

    fn duplicate(&self, max_iterations: usize) -> Self {
        match self {
            Criterion::DispOrUnbalance(c) => {
                Criterion::DispOrUnbalance(c.duplicate(max_iterations))
            }
            Criterion::DispAndUnbalance(c) => {
                Criterion::DispAndUnbalance(c.duplicate(max_iterations))
            }
        }
    }

    fn save(
        &self,
        tag: CheckpointTag,
        channel: &mut dyn Channel<S::Field>,
    ) -> Result<(), ChannelError> {
        match self {
            Criterion::DispOrUnbalance(c) => c.save(tag, channel),
            Criterion::DispAndUnbalance(c) => c.save(tag, channel),
        }
    }

    fn restore(
        &mut self,
        tag: CheckpointTag,
        channel: &mut dyn Channel<S::Field>,
    ) -> Result<(), ChannelError> {
        match self {
            Criterion::DispOrUnbalance(c) => c.restore(tag, channel),
            Criterion::DispAndUnbalance(c) => c.restore(tag, channel),
        }
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::dvector;

    use crate::checkpoint::InMemoryChannel;
    use crate::report::ReportMode;
    use crate::testing::ScriptedSystem;

    use super::disp_or_unbalance::DispOrUnbalanceOptions;

    use super::*;

    #[test]
    fn registry_rebuilds_the_tagged_variant() {
        let mut options = DispOrUnbalanceOptions::default();
        options
            .set_tol_disp(1e-6)
            .set_max_iterations(10)
            .set_report(ReportMode::Convergence);

        let criterion = Criterion::DispOrUnbalance(
            NormDispOrUnbalance::<ScriptedSystem>::with_options(options),
        );

        let mut channel = InMemoryChannel::new();
        let tag = CheckpointTag::new(5, 0);
        criterion.save(tag, &mut channel).unwrap();

        let restored =
            Criterion::<ScriptedSystem>::from_checkpoint(criterion.kind(), tag, &mut channel)
                .unwrap();

        assert_eq!(restored.kind(), CriterionKind::DispOrUnbalance);
        assert_eq!(restored.max_num_tests(), 10);
        assert_eq!(restored.history().len(), 20);
    }

    #[test]
    fn from_checkpoint_propagates_transport_errors() {
        let mut channel = InMemoryChannel::<f64>::new();

        let result = Criterion::<ScriptedSystem>::from_checkpoint(
            CriterionKind::DispAndUnbalance,
            CheckpointTag::new(9, 9),
            &mut channel,
        );

        assert!(matches!(result, Err(ChannelError::Missing(_))));
    }

    #[test]
    fn dispatches_the_contained_variant() {
        let system = ScriptedSystem::constant(dvector![1e-12], dvector![10.0]);

        let mut or = Criterion::new(CriterionKind::DispOrUnbalance);
        or.bind(&system).unwrap();
        or.start().unwrap();
        assert_eq!(or.test(), Status::Converged(1));
        assert_eq!(or.name(), "Disp-or-unbalance");

        let mut and = Criterion::new(CriterionKind::DispAndUnbalance);
        and.bind(&system).unwrap();
        and.start().unwrap();
        assert_eq!(and.test(), Status::Continue);
        assert_eq!(and.name(), "Disp-and-unbalance");
    }
}
