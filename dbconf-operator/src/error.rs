//! Operator error types.

use dbconf_ops::OpsError;
use thiserror::Error;

use crate::record::ValidationError;

/// Errors raised by the reconciliation core.
///
/// Only [`Error::Bootstrap`] is fatal. Everything else is logged and the
/// control loop keeps running.
#[derive(Debug, Error)]
pub enum Error {
    /// Desired-state record is malformed. Never retried.
    #[error("invalid record: {0}")]
    Validation(#[from] ValidationError),

    /// Listing or subscribing failed; the current cycle is abandoned.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A database operation failed for one resource.
    #[error("{action} database {name:?}: {source}")]
    Operation {
        action: &'static str,
        name: String,
        #[source]
        source: OpsError,
    },

    /// Schema registration or readiness exceeded its retry budget.
    #[error("bootstrap: {0}")]
    Bootstrap(String),

    /// A stream event could not be decoded.
    #[error("malformed event: {0}")]
    Protocol(String),
}

impl Error {
    pub(crate) fn operation(action: &'static str, name: &str, source: OpsError) -> Self {
        Self::Operation {
            action,
            name: name.to_string(),
            source,
        }
    }

    /// Whether the process must exit because of this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Bootstrap(_))
    }
}

/// Result type for the reconciliation core.
pub type Result<T> = std::result::Result<T, Error>;
