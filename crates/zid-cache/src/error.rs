//! Error types for the ZID cache.
//!
//! All errors are strongly typed and propagated without panicking.
//! Retained-secret material is never included in error messages.

use std::path::PathBuf;

/// Cache error types covering all store operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("ZID cache is already open")]
    AlreadyOpen,

    #[error("ZID cache is not open")]
    NotOpen,

    #[error("Failed to create ZID cache at {}: {source}", path.display())]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid ZID cache header: {0}")]
    InvalidHeader(String),

    #[error("Legacy ZID cache migration aborted: {0}")]
    MigrationAborted(String),

    #[error("Write to ZID cache failed: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("Record handle does not belong to this ZID cache session")]
    ForeignRecord,

    #[error("Invalid record length: expected {expected} bytes, got {actual}")]
    InvalidRecordLength { expected: usize, actual: usize },

    #[error("Invalid ZID: {0}")]
    InvalidZid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CacheError>;
