//! AND-combined dual-norm convergence criterion.
//!
//! Accepts the iteration only when *both* the solution-increment norm and the
//! residual norm are within their tolerances, making it stricter than
//! [`NormDispOrUnbalance`](super::disp_or_unbalance::NormDispOrUnbalance).
//!
//! Because requiring both norms makes stagnation more likely, this criterion
//! can optionally watch for divergence: when both norms grow for more than
//! `max_increase` successive iterations, the step is declared failed without
//! waiting for the budget to run out.

use getset::{CopyGetters, Setters};
use log::{debug, info, warn};
use nalgebra::{convert, try_convert, DVector, RealField};

use crate::checkpoint::{Channel, ChannelError, CheckpointTag};
use crate::core::{BindError, ConvergenceTest, LinearSystem, NotBoundError, Stall, Status};
use crate::history::History;
use crate::report::ReportMode;

use super::disp_or_unbalance::{DEFAULT_MAX_ITERATIONS, DEFAULT_NORM_ORDER, DEFAULT_TOL};

/// Number of scalars in the checkpoint record: the common 5-scalar layout
/// plus the divergence threshold.
const RECORD_LEN: usize = 6;

/// Options for the [`NormDispAndUnbalance`] criterion.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct DispAndUnbalanceOptions<T: RealField + Copy> {
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
    /// Number of successive iterations in which both norms are allowed to
    /// grow before declaring divergence. `0` disables the check. Default:
    /// `0`.
    max_increase: usize,
}

impl<T: RealField + Copy> Default for DispAndUnbalanceOptions<T> {
    fn default() -> Self {
        Self {
            tol_disp: convert(DEFAULT_TOL),
            tol_unbalance: convert(DEFAULT_TOL),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            norm_order: DEFAULT_NORM_ORDER,
            report: ReportMode::Silent,
            max_increase: 0,
        }
    }
}

/// AND-combined dual-norm criterion. See [module](self) documentation for
/// more details.
#[derive(Debug)]
pub struct NormDispAndUnbalance<'sys, S: LinearSystem> {
    options: DispAndUnbalanceOptions<S::Field>,
    system: Option<&'sys S>,
    current_iteration: usize,
    history: History<S::Field>,
    last_norms: Option<(S::Field, S::Field)>,
    growth: usize,
}

impl<'sys, S: LinearSystem> NormDispAndUnbalance<'sys, S> {
    /// Initializes the criterion with default options.
    pub fn new() -> Self {
        Self::with_options(Default::default())
    }

    /// Initializes the criterion with given options.
    pub fn with_options(options: DispAndUnbalanceOptions<S::Field>) -> Self {
        let history = History::new(options.max_iterations);

        Self {
            options,
            system: None,
            current_iteration: 0,
            history,
            last_norms: None,
            growth: 0,
        }
    }
}

impl<'sys, S: LinearSystem> Default for NormDispAndUnbalance<'sys, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'sys, S: LinearSystem> ConvergenceTest<'sys, S> for NormDispAndUnbalance<'sys, S> {
    const NAME: &'static str = "Disp-and-unbalance";

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
        self.last_norms = None;
        self.growth = 0;
        Ok(())
    }

    fn test(&mut self) -> Status {
        let system = match self.system {
            Some(system) => system,
            None => return Status::NotReady(Stall::Unbound),
        };

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

        if norm_x <= opts.tol_disp && norm_b <= opts.tol_unbalance {
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

        // A run of iterations in which both norms grow means the step is
        // moving away from equilibrium.
        if let Some((last_x, last_b)) = self.last_norms {
            if norm_x > last_x && norm_b > last_b {
                self.growth += 1;
            } else {
                self.growth = 0;
            }
        }
        self.last_norms = Some((norm_x, norm_b));

        if opts.max_increase > 0 && self.growth > opts.max_increase {
            warn!(
                "{}: norms grew for {} successive iterations, giving up",
                Self::NAME,
                self.growth
            );

            self.current_iteration += 1;
            return Status::NotReady(Stall::Diverged);
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
            last_norms: None,
            growth: 0,
        }
    }

    fn save(
        &self,
        tag: CheckpointTag,
        channel: &mut dyn Channel<S::Field>,
    ) -> Result<(), ChannelError> {
        let opts = &self.options;

        let mut record = DVector::zeros(RECORD_LEN);
        record[0] = opts.tol_disp;
        record[1] = convert(opts.max_iterations as f64);
        record[2] = convert(opts.report.code() as f64);
        record[3] = convert(opts.norm_order as f64);
        record[4] = opts.tol_unbalance;
        record[5] = convert(opts.max_increase as f64);

        channel.send_vector(tag, &record).map_err(|err| {
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
                let max_iterations = try_convert::<_, f64>(record[1])
                    .map_or(DEFAULT_MAX_ITERATIONS, |v| (v as usize).max(1));
                let report =
                    ReportMode::from_code(try_convert::<_, f64>(record[2]).map_or(0, |v| v as i64));
                let norm_order =
                    try_convert::<_, f64>(record[3]).map_or(DEFAULT_NORM_ORDER, |v| v as i32);
                let max_increase = try_convert::<_, f64>(record[5]).map_or(0, |v| v as usize);

                self.options = DispAndUnbalanceOptions {
                    tol_disp: record[0],
                    tol_unbalance: record[4],
                    max_iterations,
                    norm_order,
                    report,
                    max_increase,
                };
                self.history.resize(max_iterations);
                self.current_iteration = 0;
                self.last_norms = None;
                self.growth = 0;
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
                self.last_norms = None;
                self.growth = 0;
                Err(err)
            }
        }
    }
}
