//! Reporting policy for convergence criteria.
//!
//! Criteria emit their records through the [`log`] facade; the mode selected
//! here only decides *what* is emitted. Consumers install the logging backend
//! of their choice, which also gives tests a place to capture the output.

/// Reporting verbosity and budget-exhaustion policy of a criterion.
///
/// The variants map to the numeric print codes used in checkpoints and in
/// hosting frameworks, see [`ReportMode::code`]. Note that the two
/// `AcceptAnyway` modes are not mere verbosity: they switch budget exhaustion
/// from a failure into a degraded success with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    /// No output. Code 0.
    #[default]
    Silent,
    /// A summary record for every iteration, plus one on convergence. Code 1.
    Iterations,
    /// A single summary record on convergence. Code 2.
    Convergence,
    /// Like [`Iterations`](ReportMode::Iterations), with the raw increment
    /// and residual vectors at debug level. Code 4.
    Vectors,
    /// Accept budget exhaustion as (degraded) convergence, with a warning.
    /// Code 5.
    AcceptAnyway,
    /// [`AcceptAnyway`](ReportMode::AcceptAnyway) plus the summary record on
    /// convergence. Code 6.
    AcceptAnywayConvergence,
}

impl ReportMode {
    /// The numeric code stored in checkpoint records.
    pub fn code(self) -> i64 {
        match self {
            ReportMode::Silent => 0,
            ReportMode::Iterations => 1,
            ReportMode::Convergence => 2,
            ReportMode::Vectors => 4,
            ReportMode::AcceptAnyway => 5,
            ReportMode::AcceptAnywayConvergence => 6,
        }
    }

    /// Decodes a numeric code. Codes without an assigned meaning (including
    /// the historically unused 3) decode to [`ReportMode::Silent`].
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => ReportMode::Iterations,
            2 => ReportMode::Convergence,
            4 => ReportMode::Vectors,
            5 => ReportMode::AcceptAnyway,
            6 => ReportMode::AcceptAnywayConvergence,
            _ => ReportMode::Silent,
        }
    }

    /// Whether a summary is emitted on every iteration.
    pub fn per_iteration(self) -> bool {
        matches!(self, ReportMode::Iterations | ReportMode::Vectors)
    }

    /// Whether the raw vectors are emitted alongside the per-iteration
    /// summary.
    pub fn with_vectors(self) -> bool {
        matches!(self, ReportMode::Vectors)
    }

    /// Whether a final summary is emitted when convergence is declared.
    pub fn on_convergence(self) -> bool {
        matches!(
            self,
            ReportMode::Iterations
                | ReportMode::Convergence
                | ReportMode::Vectors
                | ReportMode::AcceptAnywayConvergence
        )
    }

    /// Whether budget exhaustion is promoted to degraded convergence.
    pub fn accept_exhausted(self) -> bool {
        matches!(
            self,
            ReportMode::AcceptAnyway | ReportMode::AcceptAnywayConvergence
        )
    }
}
