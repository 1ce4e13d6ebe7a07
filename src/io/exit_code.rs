//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success - operation completed, results found (or no results is acceptable)
//! - `1`: General error - unspecified failure
//! - `3-125`: Specific recoverable errors
//! - `75`: Temporary failure (`EX_TEMPFAIL`), used when a run was skipped
//! - `126-255`: Reserved by shell

use crate::error::PipelineError;
use crate::jobs::RunOutcome;

/// Standard exit codes for CLI operations.
///
/// These codes follow Unix conventions where 0 indicates success,
/// and non-zero values indicate various error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Query ran but found nothing (code 3)
    NotFound = 3,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// No fitted model pair yet (code 7)
    ModelUnavailable = 7,

    /// Another run held the run token (code 75)
    RunSkipped = 75,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl ExitCode {
    /// `Success` if any hits were found, `NotFound` if empty.
    pub fn from_hits<T>(hits: &[T]) -> Self {
        if hits.is_empty() {
            ExitCode::NotFound
        } else {
            ExitCode::Success
        }
    }

    /// Convert a `PipelineError` to the appropriate exit code.
    pub fn from_error(error: &PipelineError) -> Self {
        match error {
            PipelineError::ModelUnavailable { .. } => ExitCode::ModelUnavailable,
            PipelineError::Config { .. } => ExitCode::ConfigError,
            _ => ExitCode::GeneralError,
        }
    }

    /// Exit code for a single pipeline run.
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed(_) => ExitCode::Success,
            RunOutcome::Skipped => ExitCode::RunSkipped,
            RunOutcome::Failed(err) => Self::from_error(err),
        }
    }

    /// Check if this exit code indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::NotFound => "Not found",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::ModelUnavailable => "Model unavailable",
            ExitCode::RunSkipped => "Run skipped",
        }
    }
}
