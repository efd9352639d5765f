//! Desired-state records.

use std::fmt;

use thiserror::Error;

/// One managed database as declared by a custom resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DesiredRecord {
    /// Database name; the identity of the managed resource.
    pub name: String,
    /// Accountable owner of the database.
    pub owner: String,
}

/// Why a record was rejected before reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("database is not set")]
    MissingName,
    #[error("owner is not set")]
    MissingOwner,
}

impl DesiredRecord {
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
        }
    }

    /// Structural check applied before any database call.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::MissingName);
        }
        if self.owner.is_empty() {
            return Err(ValidationError::MissingOwner);
        }
        Ok(())
    }
}

impl fmt::Display for DesiredRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "database={:?} owner={:?}", self.name, self.owner)
    }
}
