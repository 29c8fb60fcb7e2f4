//! Error taxonomy for relwatch.
//!
//! Expected conditions (missing fields, lookup misses, version mismatches)
//! never show up here; they are carried as `ValidationResult` and
//! `ReconciliationDecision` values. These errors cover the boundaries only.

/// Errors raised while loading or checking configuration.
///
/// Configuration failures are fatal: a run aborts before any fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting(s): {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Failure reported by an external collaborator (record store, release
/// lookup, messenger).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("connectivity failure: {0}")]
    Connectivity(String),

    #[error("remote rejected request: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Run-level errors. Anything here aborts the whole reconciliation pass.
#[derive(Debug, thiserror::Error)]
pub enum RelwatchError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to fetch rows from record store: {0}")]
    Fetch(PortError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for run-level operations.
pub type Result<T> = std::result::Result<T, RelwatchError>;

/// Result type for collaborator calls.
pub type PortResult<T> = std::result::Result<T, PortError>;
