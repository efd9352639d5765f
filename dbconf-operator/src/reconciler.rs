//! Database reconciler - converges a database server towards desired records.
//!
//! Every call re-reads the server's database list; nothing about actual state
//! is cached between calls. Both operations are idempotent: repeating them
//! with the same input leaves the server unchanged and reports `Unchanged`.

use std::fmt;
use std::sync::Arc;

use dbconf_ops::{Database, DatabaseOps};
use tracing::{error, info, warn};

use crate::audit::OperatorAuditLogger;
use crate::error::{Error, Result};
use crate::record::DesiredRecord;

/// What the record asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// The database must exist with the record's owner.
    Present,
    /// The database must not exist.
    Absent,
}

/// Result of one convergence step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created,
    OwnerChanged { previous: String },
    Deleted,
    Unchanged,
    Invalid,
    Failed,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::OwnerChanged { .. } => "owner-changed",
            Self::Deleted => "deleted",
            Self::Unchanged => "unchanged",
            Self::Invalid => "invalid",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "database created"),
            Self::OwnerChanged { previous } => write!(f, "owner {:?} changed", previous),
            Self::Deleted => write!(f, "database deleted"),
            Self::Unchanged => write!(f, "already reconciled"),
            Self::Invalid => write!(f, "invalid record"),
            Self::Failed => write!(f, "reconciliation failed"),
        }
    }
}

/// Reconciler for managed databases.
pub struct Reconciler<O> {
    ops: O,
    audit: Arc<OperatorAuditLogger>,
}

impl<O: DatabaseOps> Reconciler<O> {
    pub fn new(ops: O, audit: Arc<OperatorAuditLogger>) -> Self {
        Self { ops, audit }
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// Current databases as reported by the server.
    pub async fn observe(&self) -> Result<Vec<Database>> {
        self.ops
            .list_databases()
            .await
            .map_err(|e| Error::BackendUnavailable(format!("listing databases: {}", e)))
    }

    async fn find(&self, name: &str) -> Result<Option<Database>> {
        Ok(self.observe().await?.into_iter().find(|db| db.name == name))
    }

    /// Make sure the database exists and is owned by `desired.owner`.
    ///
    /// Errors from the server are returned as-is; retrying is up to the caller.
    pub async fn ensure_created(&self, desired: &DesiredRecord) -> Result<Outcome> {
        match self.find(&desired.name).await? {
            None => {
                self.ops
                    .create_database(&desired.name, &desired.owner)
                    .await
                    .map_err(|e| Error::operation("creating", &desired.name, e))?;
                self.audit.database_created(&desired.name, &desired.owner);
                Ok(Outcome::Created)
            }
            Some(db) if db.owner != desired.owner => {
                self.ops
                    .change_owner(&desired.name, &desired.owner)
                    .await
                    .map_err(|e| Error::operation("changing owner of", &desired.name, e))?;
                self.audit
                    .owner_changed(&desired.name, &db.owner, &desired.owner);
                Ok(Outcome::OwnerChanged { previous: db.owner })
            }
            Some(_) => Ok(Outcome::Unchanged),
        }
    }

    /// Make sure the database named by `desired` is gone.
    pub async fn ensure_deleted(&self, desired: &DesiredRecord) -> Result<Outcome> {
        match self.find(&desired.name).await? {
            Some(_) => {
                self.ops
                    .delete_database(&desired.name)
                    .await
                    .map_err(|e| Error::operation("deleting", &desired.name, e))?;
                self.audit.database_deleted(&desired.name);
                Ok(Outcome::Deleted)
            }
            None => Ok(Outcome::Unchanged),
        }
    }

    /// Validate `record`, then converge towards `intent`.
    ///
    /// Never fails: invalid records and server errors are logged and
    /// reported as [`Outcome::Invalid`] and [`Outcome::Failed`].
    pub async fn reconcile(&self, record: &DesiredRecord, intent: Intent) -> Outcome {
        if let Err(e) = record.validate() {
            warn!(database = %record.name, owner = %record.owner, "Skipping invalid record: {}", e);
            return Outcome::Invalid;
        }

        let result = match intent {
            Intent::Present => self.ensure_created(record).await,
            Intent::Absent => self.ensure_deleted(record).await,
        };

        match result {
            Ok(outcome) => {
                info!(database = %record.name, owner = %record.owner, outcome = outcome.label(), "Reconciled: {}", outcome);
                outcome
            }
            Err(e) => {
                error!(database = %record.name, owner = %record.owner, "Reconciliation failed: {}", e);
                self.audit.reconcile_failed(&record.name, &e.to_string());
                Outcome::Failed
            }
        }
    }
}
