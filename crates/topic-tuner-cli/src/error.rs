//! CLI exit codes.
//!
//! - 0: Success
//! - 1: Runtime failure
//! - 2: Invalid configuration or input

use topic_tuner_core::TunerError;

/// Exit codes for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CliExitCode {
    /// Search finished and the report was written
    Success = 0,
    /// Search could not finish
    Failure = 1,
    /// Configuration or input was rejected before or during the search
    InvalidInput = 2,
}

impl From<CliExitCode> for i32 {
    fn from(code: CliExitCode) -> Self {
        code as i32
    }
}

impl From<&TunerError> for CliExitCode {
    fn from(err: &TunerError) -> Self {
        match err {
            TunerError::InvalidConfiguration(_) => CliExitCode::InvalidInput,
            TunerError::Config(_) => CliExitCode::InvalidInput,
            TunerError::DimensionMismatch { .. } => CliExitCode::InvalidInput,
            TunerError::EmptyInput => CliExitCode::InvalidInput,

            TunerError::NotReady(_) => CliExitCode::Failure,
            TunerError::OptimizerFailure(_) => CliExitCode::Failure,
            TunerError::Cancelled { .. } => CliExitCode::Failure,
        }
    }
}

/// Exit code for any error a command handler returns.
///
/// Tuner errors keep their classification through `anyhow` context layers;
/// JSON errors count as bad input; everything else is a runtime failure.
pub fn exit_code_for_error(e: &anyhow::Error) -> CliExitCode {
    if let Some(tuner_err) = e.downcast_ref::<TunerError>() {
        return CliExitCode::from(tuner_err);
    }
    if e.downcast_ref::<serde_json::Error>().is_some() {
        return CliExitCode::InvalidInput;
    }
    CliExitCode::Failure
}
