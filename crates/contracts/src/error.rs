//! Layered error definitions
//!
//! Categorized by run phase: config / connection / validation / fetch / mutation

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Provider Errors =====
    /// Provider unreachable or unauthenticated
    #[error("connection to '{provider}' failed: {message}")]
    Connection { provider: String, message: String },

    /// A single fetched record is malformed
    #[error("invalid record '{record}' from '{provider}': {message}")]
    Validation {
        provider: String,
        record: String,
        message: String,
    },

    /// Fetching (part of) a collection failed
    #[error("fetch from '{provider}' failed for '{group}': {message}")]
    Fetch {
        provider: String,
        group: String,
        message: String,
    },

    /// A write to a provider failed
    #[error("{operation} on '{provider}' failed{}: {message}", key_suffix(.key))]
    Mutation {
        provider: String,
        operation: String,
        key: Option<String>,
        message: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

fn key_suffix(key: &Option<String>) -> String {
    key.as_deref()
        .map(|k| format!(" for record '{k}'"))
        .unwrap_or_default()
}

/// Coarse classification used by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connection,
    Validation,
    Fetch,
    Mutation,
    Other,
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create connection error
    pub fn connection(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create record validation error
    pub fn validation(
        provider: impl Into<String>,
        record: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            provider: provider.into(),
            record: record.into(),
            message: message.into(),
        }
    }

    /// Create fetch error
    pub fn fetch(
        provider: impl Into<String>,
        group: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Fetch {
            provider: provider.into(),
            group: group.into(),
            message: message.into(),
        }
    }

    /// Create mutation error
    pub fn mutation(
        provider: impl Into<String>,
        operation: impl Into<String>,
        key: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Mutation {
            provider: provider.into(),
            operation: operation.into(),
            key,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigParse { .. } | Self::ConfigValidation { .. } => ErrorKind::Config,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Fetch { .. } => ErrorKind::Fetch,
            Self::Mutation { .. } => ErrorKind::Mutation,
            Self::Io(_) | Self::Other(_) => ErrorKind::Other,
        }
    }
}
