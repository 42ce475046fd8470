//! CLI error types and exit codes.

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, I/O or malformed input
    pub const GENERAL_ERROR: i32 = 1;
    /// Replay failure - the engine or the host failed while replaying
    pub const REPLAY_FAILURE: i32 = 2;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Script could not be read or parsed
    #[error("Script error: {0}")]
    Script(String),

    /// Snapshot could not be decoded
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Event folding failed
    #[error("Sync error: {0}")]
    Sync(String),

    /// A step referenced something the tree does not hold
    #[error("Step {step} failed: {reason}")]
    Step {
        /// Zero-based step number
        step: usize,
        /// What went wrong
        reason: String,
    },

    /// Async runtime could not start
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tabtree_core::TabTreeError> for CliError {
    fn from(err: tabtree_core::TabTreeError) -> Self {
        use tabtree_core::TabTreeError;
        match err {
            TabTreeError::Config(e) => Self::Config(e.to_string()),
            TabTreeError::Snapshot(e) => Self::Snapshot(e.to_string()),
            other => Self::Sync(other.to_string()),
        }
    }
}

impl From<tabtree_core::SyncError> for CliError {
    fn from(err: tabtree_core::SyncError) -> Self {
        Self::Sync(err.to_string())
    }
}

impl CliError {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit codes:
    /// - 0: Success (not an error)
    /// - 1: General error (configuration, script, snapshot, IO)
    /// - 2: Replay failure (sync, step, runtime)
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Sync(_) | Self::Step { .. } | Self::Runtime(_) => exit_codes::REPLAY_FAILURE,
            Self::Config(_) | Self::Script(_) | Self::Snapshot(_) | Self::Io(_) => {
                exit_codes::GENERAL_ERROR
            }
        }
    }
}
