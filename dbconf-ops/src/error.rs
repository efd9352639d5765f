//! Database operation errors.

use thiserror::Error;

/// Errors returned by [`DatabaseOps`](crate::DatabaseOps) implementations.
#[derive(Debug, Error)]
pub enum OpsError {
    /// Name or owner cannot be used as an SQL identifier.
    #[error("invalid identifier {0:?}: {1}")]
    InvalidIdentifier(String, &'static str),

    /// The server rejected a statement or the connection failed.
    #[error("sql: {0}")]
    Sql(#[from] sqlx::Error),

    /// The backend cannot be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Failure injected into the in-memory backend.
    #[error("injected failure: {0}")]
    Injected(String),
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, OpsError>;
