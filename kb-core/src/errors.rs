//! Top-level error type for the knowledge store.
//! All failure paths funnel through `StoreError` via `From` impls so that
//! query-layer code can propagate with `?`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bad config: {0}")]
    BadConfig(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("open error for project {project}: {source}")]
    OpenError {
        project: String,
        source: rusqlite::Error,
    },

    #[error("init error for project {project}: {reason}")]
    InitError { project: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint error: {0}")]
    ConstraintError(String),

    #[error("capability missing: {0}")]
    CapabilityMissing(String),

    #[error("cancelled")]
    Cancelled,

    #[error("commit error: {0}")]
    CommitError(String),

    #[error("rollback error: {original}, additionally failed to roll back: {rollback}")]
    RollbackError { original: String, rollback: String },

    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout `kb-core` and `kb-store`.
pub type StoreResult<T> = Result<T, StoreError>;
