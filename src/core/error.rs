//! Error types for wsprnet-relay

use thiserror::Error;

/// Convenience Result type for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("analytic store error: {0}")]
    Store(#[from] clickhouse::error::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Outcome of validating a candidate bundle with the tar validator subprocess.
///
/// A bundle is either proven valid, proven corrupt (never re-enters the
/// pipeline), or left inconclusive (retried with back-off).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Corrupt(String),
    Inconclusive(String),
}

/// Outcome of a single bulk-insert attempt against the analytic store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Ok,
    Retry(String),
    Fatal(String),
}
