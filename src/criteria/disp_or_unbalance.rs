//! OR-combined dual-norm convergence criterion.
//!
//! Accepts the iteration when *either* the p-norm of the solution increment
//! is within `tol_disp` *or* the p-norm of the residual is within
//! `tol_unbalance`. A single well-satisfied criterion is enough; this is the
//! forgiving counterpart of
//! [`NormDispAndUnbalance`](super::disp_and_unbalance::NormDispAndUnbalance).
//!
//! Checking the increment covers the common case of Newton-type iterations
//! stagnating with a small correction while the residual is still noisy;
//! checking the residual covers steps that balance the equations before the
//! correction settles.

use getset::{CopyGetters, Setters};
use log::{debug, info, warn};
use nalgebra::{convert, try_convert, DVector, RealField};

use crate::checkpoint::{Channel, ChannelError, CheckpointTag};
use crate::core::{BindError, ConvergenceTest, LinearSystem, NotBoundError, Stall, Status};
use crate::history::History;
use crate::report::ReportMode;

/// Number of scalars in the checkpoint record.
pub(super) const RECORD_LEN: usize = 5;

pub(super) const DEFAULT_TOL: f64 = 1e-8;
pub(super) const DEFAULT_MAX_ITERATIONS: usize = 25;
pub(super) const DEFAULT_NORM_ORDER: i32 = 2;

/// Options for the [`NormDispOrUnbalance`] criterion.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct DispOrUnbalanceOptions<T: RealField + Copy> {
    /// Tolerance on the solution-increment norm. Default: `1e-8`.
    tol_disp: T,
    /// Tolerance on the residual norm. Default: `1e-8`.
    tol_unbalance: T,
    /// Iteration budget for one nonlinear step. Must be positive. Default:
    /// `25`.
    max_iterations: usize,
    /// Order of the p-norm applied to both vectors. Default: `2`.
    norm_order: i32,
    /// Reporting and budget-exhaustion policy. Default:
    /// [`ReportMode::Silent`].
    report: ReportMode,
}

impl<T: RealField + Copy> Default for DispOrUnbalanceOptions<T> {
    fn default() -> Self {
        Self {
            tol_disp: convert(DEFAULT_TOL),
            tol_unbalance: convert(DEFAULT_TOL),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            norm_order: DEFAULT_NORM_ORDER,
            report: ReportMode::Silent,
        }
    }
}

/// OR-combined dual-norm criterion. See [module](self) documentation for more
/// details.
#[derive(Debug)]
pub struct NormDispOrUnbalance<'sys, S: LinearSystem> {
    options: DispOrUnbalanceOptions<S::Field>,
    system: Option<&'sys S>,
    current_iteration: usize,
    history: History<S::Field>,
}

impl<'sys, S: LinearSystem> NormDispOrUnbalance<'sys, S> {
    /// Initializes the criterion with default options.
    pub fn new() -> Self {
        Self::with_options(Default::default())
    }

    /// Initializes the criterion with given options.
    pub fn with_options(options: DispOrUnbalanceOptions<S::Field>) -> Self {
        let history = History::new(options.max_iterations);

        Self {
            options,
            system: None,
            current_iteration: 0,
            history,
        }
    }
}

impl<'sys, S: LinearSystem> Default for NormDispOrUnbalance<'sys, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'sys, S: LinearSystem> ConvergenceTest<'sys, S> for NormDispOrUnbalance<'sys, S> {
    const NAME: &'static str = "Disp-or-unbalance";

    fn bind(&mut self, system: &'sys S) -> Result<(), BindError> {
        let increment = system.solution_increment().len();
        let residual = system.residual().len();

        if increment != residual {
            return Err(BindError::DimensionMismatch {
                increment,
                residual,
            });
        }

        self.system = Some(system);
        Ok(())
    }

    fn start(&mut self) -> Result<(), NotBoundError> {
        if self.system.is_none() {
            warn!("{}: start() called before binding a linear system", Self::NAME);
            return Err(NotBoundError);
        }

        self.history.clear();
        self.current_iteration = 1;
        Ok(())
    }

    fn test(&mut self) -> Status {
        let system = match self.system {
            Some(system) => system,
            None => return Status::NotReady(Stall::Unbound),
        };

        // The driving algorithm skipped start(). Without the reset the
        // counter would never leave its terminal value in later steps.
        if self.current_iteration == 0 {
            warn!("{}: test() called before start()", Self::NAME);
            return Status::NotReady(Stall::NotStarted);
        }

        let opts = &self.options;
        let x = system.solution_increment();
        let b = system.residual();
        let norm_x = system.p_norm(x, opts.norm_order);
        let norm_b = system.p_norm(b, opts.norm_order);

        self.history.record(self.current_iteration, norm_x, norm_b);

        if opts.report.per_iteration() {
            info!(
                "{}: iteration = {}, |dx| = {:?}, |r| = {:?}",
                Self::NAME,
                self.current_iteration,
                norm_x,
                norm_b
            );

            if opts.report.with_vectors() {
                debug!("dx = {:?}", x.as_slice());
                debug!("r = {:?}", b.as_slice());
            }
        }

        // Either criterion alone is sufficient. The counter stays put so the
        // returned iteration count equals the number of tests performed.
        if norm_x <= opts.tol_disp || norm_b <= opts.tol_unbalance {
            if opts.report.on_convergence() {
                info!(
                    "{}: converged at iteration {} with |dx| = {:?}, |r| = {:?}",
                    Self::NAME,
                    self.current_iteration,
                    norm_x,
                    norm_b
                );
            }

            return Status::Converged(self.current_iteration);
        }

        if self.current_iteration >= opts.max_iterations {
            if opts.report.accept_exhausted() {
                warn!(
                    "{}: failed to converge within {} iterations, accepting anyway \
                     (|dx| = {:?}, |r| = {:?})",
                    Self::NAME,
                    opts.max_iterations,
                    norm_x,
                    norm_b
                );

                return Status::Converged(self.current_iteration);
            }

            warn!(
                "{}: failed to converge after {} iterations",
                Self::NAME,
                self.current_iteration
            );

            self.current_iteration += 1;
            return Status::NotReady(Stall::BudgetExhausted);
        }

        self.current_iteration += 1;
        Status::Continue
    }

    fn num_tests(&self) -> usize {
        self.current_iteration
    }

    fn max_num_tests(&self) -> usize {
        self.options.max_iterations
    }

    fn ratio_num_to_max(&self) -> S::Field {
        convert(self.current_iteration as f64 / self.options.max_iterations as f64)
    }

    fn history(&self) -> &History<S::Field> {
        &self.history
    }

    fn duplicate(&self, max_iterations: usize) -> Self {
        let mut options = self.options.clone();
        options.max_iterations = max_iterations;

        Self {
            options,
            system: self.system,
            current_iteration: 0,
            history: History::new(max_iterations),
        }
    }

    fn save(
        &self,
        tag: CheckpointTag,
        channel: &mut dyn Channel<S::Field>,
    ) -> Result<(), ChannelError> {
        channel
            .send_vector(tag, &pack_record(&self.options))
            .map_err(|err| {
                warn!("{}: failed to send checkpoint record: {}", Self::NAME, err);
                err
            })
    }

    fn restore(
        &mut self,
        tag: CheckpointTag,
        channel: &mut dyn Channel<S::Field>,
    ) -> Result<(), ChannelError> {
        let mut record = DVector::zeros(RECORD_LEN);

        match channel.recv_vector(tag, &mut record) {
            Ok(()) => {
                self.options = unpack_record(&record);
                self.history.resize(self.options.max_iterations);
                self.current_iteration = 0;
                Ok(())
            }
            Err(err) => {
                warn!(
                    "{}: failed to receive checkpoint record ({}), falling back to defaults",
                    Self::NAME,
                    err
                );

                self.options = Default::default();
                self.history.resize(self.options.max_iterations);
                self.current_iteration = 0;
                Err(err)
            }
        }
    }
}

/// Packs options into the 5-scalar wire record. Integers are stored as reals
/// and truncated on restore.
pub(super) fn pack_record<T: RealField + Copy>(
    options: &DispOrUnbalanceOptions<T>,
) -> DVector<T> {
    let mut record = DVector::zeros(RECORD_LEN);
    record[0] = options.tol_disp;
    record[1] = convert(options.max_iterations as f64);
    record[2] = convert(options.report.code() as f64);
    record[3] = convert(options.norm_order as f64);
    record[4] = options.tol_unbalance;
    record
}

pub(super) fn unpack_record<T: RealField + Copy>(record: &DVector<T>) -> DispOrUnbalanceOptions<T> {
    // The budget must stay positive for the history sizing invariant.
    let max_iterations = try_convert::<_, f64>(record[1])
        .map_or(DEFAULT_MAX_ITERATIONS, |v| (v as usize).max(1));
    let report = ReportMode::from_code(try_convert::<_, f64>(record[2]).map_or(0, |v| v as i64));
    let norm_order = try_convert::<_, f64>(record[3]).map_or(DEFAULT_NORM_ORDER, |v| v as i32);

    DispOrUnbalanceOptions {
        tol_disp: record[0],
        tol_unbalance: record[4],
        max_iterations,
        norm_order,
        report,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    use crate::checkpoint::InMemoryChannel;
    use crate::testing::{FailingChannel, ScriptedSystem};

    use super::*;

    fn unreachable_options() -> DispOrUnbalanceOptions<f64> {
        let mut options = DispOrUnbalanceOptions::default();
        options
            .set_tol_disp(0.0)
            .set_tol_unbalance(0.0)
            .set_max_iterations(3);
        options
    }

    #[test]
    fn unbound_criterion_is_not_ready() {
        let mut criterion = NormDispOrUnbalance::<ScriptedSystem>::new();

        assert_eq!(criterion.test(), Status::NotReady(Stall::Unbound));
        assert!(criterion.history().as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn bind_rejects_mismatched_vectors() {
        let system = ScriptedSystem::constant(dvector![1.0, 1.0], dvector![1.0]);
        let mut criterion = NormDispOrUnbalance::new();

        assert!(matches!(
            criterion.bind(&system),
            Err(BindError::DimensionMismatch {
                increment: 2,
                residual: 1
            })
        ));
    }

    #[test]
    fn start_requires_binding() {
        let mut criterion = NormDispOrUnbalance::<ScriptedSystem>::new();
        assert!(criterion.start().is_err());
    }

    #[test]
    fn test_before_start_is_not_ready() {
        let system = ScriptedSystem::constant(dvector![1.0], dvector![1.0]);
        let mut criterion = NormDispOrUnbalance::new();
        criterion.bind(&system).unwrap();

        assert_eq!(criterion.test(), Status::NotReady(Stall::NotStarted));
    }

    #[test]
    fn either_norm_within_tolerance_converges() {
        // Residual is far off, but the increment norm is tiny.
        let system = ScriptedSystem::constant(dvector![1e-12, 0.0], dvector![10.0, 10.0]);

        let mut criterion = NormDispOrUnbalance::new();
        criterion.bind(&system).unwrap();
        criterion.start().unwrap();

        assert_eq!(criterion.test(), Status::Converged(1));
        // Convergence leaves the counter unchanged.
        assert_eq!(criterion.num_tests(), 1);
    }

    #[test]
    fn continue_increments_the_counter() {
        let system = ScriptedSystem::constant(dvector![1.0], dvector![1.0]);

        let mut criterion = NormDispOrUnbalance::with_options(unreachable_options());
        criterion.bind(&system).unwrap();
        criterion.start().unwrap();

        assert_eq!(criterion.num_tests(), 1);
        assert_eq!(criterion.test(), Status::Continue);
        assert_eq!(criterion.num_tests(), 2);
        assert_eq!(criterion.test(), Status::Continue);
        assert_eq!(criterion.num_tests(), 3);
    }

    #[test]
    fn exhausted_budget_fails_by_default() {
        let system = ScriptedSystem::constant(dvector![1.0], dvector![1.0]);

        let mut criterion = NormDispOrUnbalance::with_options(unreachable_options());
        criterion.bind(&system).unwrap();
        criterion.start().unwrap();

        assert_eq!(criterion.test(), Status::Continue);
        assert_eq!(criterion.test(), Status::Continue);
        assert_eq!(criterion.test(), Status::NotReady(Stall::BudgetExhausted));
        assert_eq!(criterion.num_tests(), 4);
    }

    #[test]
    fn exhausted_budget_is_accepted_with_accept_anyway() {
        let system = ScriptedSystem::constant(dvector![1.0], dvector![1.0]);

        let mut options = unreachable_options();
        options.set_report(ReportMode::AcceptAnyway);

        let mut criterion = NormDispOrUnbalance::with_options(options);
        criterion.bind(&system).unwrap();
        criterion.start().unwrap();

        assert_eq!(criterion.test(), Status::Continue);
        assert_eq!(criterion.test(), Status::Continue);
        assert_eq!(criterion.test(), Status::Converged(3));
        assert_eq!(criterion.num_tests(), 3);
    }

    #[test]
    fn history_records_both_norms_per_iteration() {
        // Euclidean norms: |(3, 4)| = 5, |(6, 8)| = 10, then a tenth of each.
        let system = ScriptedSystem::new(vec![
            (dvector![3.0, 4.0], dvector![6.0, 8.0]),
            (dvector![0.3, 0.4], dvector![0.6, 0.8]),
        ]);

        let mut options = unreachable_options();
        options.set_max_iterations(2);

        let mut criterion = NormDispOrUnbalance::with_options(options);
        criterion.bind(&system).unwrap();
        criterion.start().unwrap();

        assert_eq!(criterion.test(), Status::Continue);
        system.advance();
        assert_eq!(criterion.test(), Status::NotReady(Stall::BudgetExhausted));

        let history = criterion.history();
        assert_eq!(history.len(), 4);
        assert_relative_eq!(history[0], 5.0);
        assert_relative_eq!(history[1], 0.5);
        assert_relative_eq!(history[2], 10.0);
        assert_relative_eq!(history[3], 1.0);
    }

    #[test]
    fn start_resets_counter_and_history() {
        let system = ScriptedSystem::constant(dvector![1.0], dvector![1.0]);

        let mut criterion = NormDispOrUnbalance::with_options(unreachable_options());
        criterion.bind(&system).unwrap();
        criterion.start().unwrap();

        criterion.test();
        criterion.test();

        criterion.start().unwrap();

        assert_eq!(criterion.num_tests(), 1);
        assert!(criterion.history().as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn ratio_is_floating_division() {
        let system = ScriptedSystem::constant(dvector![1.0], dvector![1.0]);

        let mut criterion = NormDispOrUnbalance::with_options(unreachable_options());
        criterion.bind(&system).unwrap();
        criterion.start().unwrap();
        criterion.test();

        assert_relative_eq!(criterion.ratio_num_to_max(), 2.0 / 3.0);
    }

    #[test]
    fn checkpoint_round_trip_restores_configuration() {
        let mut options = DispOrUnbalanceOptions::default();
        options
            .set_tol_disp(1e-6)
            .set_tol_unbalance(1e-4)
            .set_max_iterations(10)
            .set_norm_order(2)
            .set_report(ReportMode::Convergence);

        let criterion = NormDispOrUnbalance::<ScriptedSystem>::with_options(options);

        let mut channel = InMemoryChannel::new();
        let tag = CheckpointTag::new(1, 0);
        criterion.save(tag, &mut channel).unwrap();

        let mut restored = NormDispOrUnbalance::<ScriptedSystem>::new();
        restored.restore(tag, &mut channel).unwrap();

        assert_eq!(restored.options.tol_disp, 1e-6);
        assert_eq!(restored.options.tol_unbalance, 1e-4);
        assert_eq!(restored.options.max_iterations, 10);
        assert_eq!(restored.options.norm_order, 2);
        assert_eq!(restored.options.report, ReportMode::Convergence);
        assert_eq!(restored.history().len(), 20);
    }

    #[test]
    fn failed_restore_falls_back_to_defaults() {
        let mut options = DispOrUnbalanceOptions::default();
        options
            .set_tol_disp(1e-3)
            .set_tol_unbalance(1e-2)
            .set_max_iterations(7)
            .set_norm_order(1)
            .set_report(ReportMode::Vectors);

        let mut criterion = NormDispOrUnbalance::<ScriptedSystem>::with_options(options);

        let result = criterion.restore(CheckpointTag::new(1, 0), &mut FailingChannel);
        assert!(matches!(result, Err(ChannelError::Transport(_))));

        assert_eq!(criterion.options.tol_disp, DEFAULT_TOL);
        assert_eq!(criterion.options.tol_unbalance, DEFAULT_TOL);
        assert_eq!(criterion.options.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(criterion.options.norm_order, DEFAULT_NORM_ORDER);
        assert_eq!(criterion.options.report, ReportMode::Silent);
        assert_eq!(criterion.history().len(), 2 * DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn duplicate_copies_configuration_with_fresh_history() {
        let system = ScriptedSystem::constant(dvector![1.0], dvector![1.0]);

        let mut options = unreachable_options();
        options.set_report(ReportMode::Iterations);

        let mut criterion = NormDispOrUnbalance::with_options(options);
        criterion.bind(&system).unwrap();
        criterion.start().unwrap();
        criterion.test();

        let copy = criterion.duplicate(8);

        assert_eq!(copy.options.tol_disp, criterion.options.tol_disp);
        assert_eq!(copy.options.report, ReportMode::Iterations);
        assert_eq!(copy.max_num_tests(), 8);
        assert_eq!(copy.num_tests(), 0);
        assert_eq!(copy.history().len(), 16);
        assert!(copy.system.is_some());
    }
}
