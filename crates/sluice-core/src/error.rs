use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SluiceError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SluiceError>;

/// Coarse classification of a [`SluiceError`].
///
/// Retry policies and callers branch on the kind rather than on individual
/// variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The store could not be reached or refused the credentials.
    Connection,
    /// Malformed statement, constraint violation or type mismatch.
    Query,
    /// Timeout, lock contention or a busy store.
    Transient,
    /// Invalid sizes or retry parameters.
    Config,
    /// The surrounding task was cancelled before it could run.
    Cancelled,
    /// Everything else, including caller-defined failures.
    Internal,
}

impl SluiceError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SluiceError::Connection(_) => ErrorKind::Connection,
            SluiceError::Query(_) | SluiceError::Transaction(_) => ErrorKind::Query,
            SluiceError::Transient(_) => ErrorKind::Transient,
            SluiceError::Config(_) => ErrorKind::Config,
            SluiceError::Cancelled => ErrorKind::Cancelled,
            SluiceError::TaskFailed(_)
            | SluiceError::Internal(_)
            | SluiceError::Io(_)
            | SluiceError::Other(_) => ErrorKind::Internal,
        }
    }

    /// Whether a fresh attempt has a reasonable chance of succeeding.
    pub fn is_retriable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn config(msg: impl Into<String>) -> Self {
        SluiceError::Config(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        SluiceError::Query(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        SluiceError::Transient(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        SluiceError::Connection(msg.into())
    }
}

// Application Errors:
//
// Operations wrapped by the middleware return `sluice_core::Result`. Errors
// raised by application code inside such an operation convert into
// `SluiceError::Other` through the `#[from] anyhow::Error` variant, so `?`
// works on any error implementing `std::error::Error + Send + Sync + 'static`
// once it has been turned into an `anyhow::Error`.
//
// `Other` is classified as an internal error: retry policies only re-attempt
// it when configured with `RetryOn::Any`. Return `SluiceError::Transient`
// directly for application failures that are worth retrying.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(SluiceError::transient("busy").kind(), ErrorKind::Transient);
        assert_eq!(SluiceError::query("syntax").kind(), ErrorKind::Query);
        assert_eq!(SluiceError::config("size").kind(), ErrorKind::Config);
        assert_eq!(
            SluiceError::connection("refused").kind(),
            ErrorKind::Connection
        );
        assert_eq!(SluiceError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            SluiceError::from(anyhow::anyhow!("boom")).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_only_transient_is_retriable() {
        assert!(SluiceError::transient("locked").is_retriable());
        assert!(!SluiceError::query("bad").is_retriable());
        assert!(!SluiceError::connection("down").is_retriable());
        assert!(!SluiceError::config("zero").is_retriable());
    }

    #[test]
    fn test_display_carries_kind() {
        let err = SluiceError::query("no such table: users");
        assert_eq!(err.to_string(), "Query error: no such table: users");
    }
}
