//! Error types for the build invoker.

use std::io;

use config::ConfigError;
use thiserror::Error;

/// Exit code the shell reports for a command it could not execute.
pub const LAUNCH_FAILURE_CODE: i32 = 127;

/// Exit code used for configuration and filesystem problems.
pub const USAGE_FAILURE_CODE: i32 = 2;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    /// The documentation tool ran and exited unsuccessfully.
    #[error("documentation build tool failed with exit code {code}")]
    BuildToolFailure { code: i32 },

    /// The documentation tool could not be started at all.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl BuildError {
    /// Process exit code to report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::BuildToolFailure { code } => *code,
            BuildError::Launch { .. } => LAUNCH_FAILURE_CODE,
            BuildError::Config(_) | BuildError::Io(_) => USAGE_FAILURE_CODE,
        }
    }

    /// True when the tool itself produced the failure and already printed
    /// its own diagnostics.
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, BuildError::BuildToolFailure { .. })
    }
}
