//! Error types for CLI operations.

use contracts::ContractError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid combination of command-line options
    #[error("Invalid usage: {message}")]
    Usage { message: String },

    /// Sync run failed
    #[error("Sync from {from} to {to} failed: {source}")]
    Sync {
        from: String,
        to: String,
        #[source]
        source: ContractError,
    },

    /// Interrupted by a shutdown signal
    #[error("Interrupted by shutdown signal")]
    Interrupted,
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    pub fn sync(from: impl Into<String>, to: impl Into<String>, source: ContractError) -> Self {
        Self::Sync {
            from: from.into(),
            to: to.into(),
            source,
        }
    }
}
