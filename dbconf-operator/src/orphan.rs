//! Orphan collection - reclaims databases no desired record refers to.
//!
//! The desired-state store is the only source of truth for managed
//! databases. Anything the server lists that no record names is deleted.
//! This catches deletions missed while no subscription was open.

use std::collections::HashSet;

use dbconf_ops::{Database, DatabaseOps};
use tracing::{debug, error, info};

use crate::error::Result;
use crate::reconciler::{Outcome, Reconciler};
use crate::record::DesiredRecord;

/// Names protected from collection in one pass.
///
/// Valid records protect their database. A record that failed validation
/// but still carries a name protects it as well: a transient validation
/// failure must never turn into a dropped database.
#[derive(Debug, Default, Clone)]
pub struct ProtectedNames {
    names: HashSet<String>,
}

impl ProtectedNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protect(&mut self, record: &DesiredRecord) {
        if !record.name.is_empty() {
            self.names.insert(record.name.clone());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<'a> FromIterator<&'a DesiredRecord> for ProtectedNames {
    fn from_iter<I: IntoIterator<Item = &'a DesiredRecord>>(iter: I) -> Self {
        let mut names = Self::new();
        for record in iter {
            names.protect(record);
        }
        names
    }
}

/// Observed databases with no protecting record.
pub fn orphans(observed: &[Database], protected: &ProtectedNames) -> Vec<Database> {
    observed
        .iter()
        .filter(|db| !protected.contains(&db.name))
        .cloned()
        .collect()
}

/// One deletion performed by a collection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collected {
    pub name: String,
    pub outcome: Outcome,
}

/// Deletes orphaned databases through the reconciler.
pub struct OrphanCollector;

impl OrphanCollector {
    /// Run one pass.
    ///
    /// Fails only when the server cannot be listed. A failed deletion is
    /// reported as [`Outcome::Failed`] and does not stop the pass.
    pub async fn collect<O: DatabaseOps>(
        reconciler: &Reconciler<O>,
        protected: &ProtectedNames,
    ) -> Result<Vec<Collected>> {
        let observed = reconciler.observe().await?;
        let orphaned = orphans(&observed, protected);
        debug!(
            observed = observed.len(),
            protected = protected.len(),
            orphaned = orphaned.len(),
            "Orphan collection pass"
        );

        let mut collected = Vec::with_capacity(orphaned.len());
        for db in orphaned {
            info!(database = %db.name, owner = %db.owner, "Pruning orphaned database");
            let record = DesiredRecord::new(db.name, db.owner);
            let outcome = match reconciler.ensure_deleted(&record).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(database = %record.name, "Failed to prune database: {}", e);
                    Outcome::Failed
                }
            };
            collected.push(Collected {
                name: record.name,
                outcome,
            });
        }
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::OperatorAuditLogger;
    use crate::error::Error;
    use dbconf_ops::{MemoryOps, OpRecord};
    use std::sync::Arc;

    fn reconciler(ops: MemoryOps) -> Reconciler<Arc<MemoryOps>> {
        Reconciler::new(Arc::new(ops), Arc::new(OperatorAuditLogger::new_noop()))
    }

    fn abc() -> MemoryOps {
        MemoryOps::with_databases([
            Database::new("A", "alice"),
            Database::new("B", "bob"),
            Database::new("C", "carol"),
        ])
    }

    #[test]
    fn test_orphans_set_difference() {
        let observed = vec![
            Database::new("A", "alice"),
            Database::new("B", "bob"),
            Database::new("C", "carol"),
        ];
        let desired = [
            DesiredRecord::new("A", "alice"),
            DesiredRecord::new("C", "someone-else"),
        ];
        let protected: ProtectedNames = desired.iter().collect();

        assert_eq!(
            orphans(&observed, &protected),
            vec![Database::new("B", "bob")]
        );
    }

    #[tokio::test]
    async fn test_collect_deletes_exactly_orphans() {
        let r = reconciler(abc());
        let desired = [DesiredRecord::new("A", "alice"), DesiredRecord::new("C", "carol")];
        let protected: ProtectedNames = desired.iter().collect();

        let collected = OrphanCollector::collect(&r, &protected).await.unwrap();

        assert_eq!(
            collected,
            vec![Collected {
                name: "B".to_string(),
                outcome: Outcome::Deleted
            }]
        );
        assert_eq!(
            r.ops().journal().await,
            vec![OpRecord::Delete {
                name: "B".to_string()
            }]
        );
        assert_eq!(
            r.ops().snapshot().await,
            vec![Database::new("A", "alice"), Database::new("C", "carol")]
        );
    }

    #[tokio::test]
    async fn test_invalid_record_still_protects() {
        let r = reconciler(abc());
        // B's record lost its owner; B must survive.
        let desired = [
            DesiredRecord::new("A", "alice"),
            DesiredRecord::new("B", ""),
            DesiredRecord::new("C", "carol"),
        ];
        let protected: ProtectedNames = desired.iter().collect();

        let collected = OrphanCollector::collect(&r, &protected).await.unwrap();
        assert!(collected.is_empty());
        assert_eq!(r.ops().snapshot().await.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_delete_does_not_stop_pass() {
        let ops = abc();
        ops.fail_on("A").await;
        let r = reconciler(ops);

        let collected = OrphanCollector::collect(&r, &ProtectedNames::new())
            .await
            .unwrap();

        let outcomes: Vec<_> = collected.iter().map(|c| c.outcome.label()).collect();
        assert_eq!(outcomes, vec!["failed", "deleted", "deleted"]);
        assert_eq!(
            r.ops().snapshot().await,
            vec![Database::new("A", "alice")]
        );
    }

    #[tokio::test]
    async fn test_unavailable_server_aborts_pass() {
        let ops = abc();
        ops.set_unavailable(true).await;
        let r = reconciler(ops);

        let result = OrphanCollector::collect(&r, &ProtectedNames::new()).await;
        assert!(matches!(result, Err(Error::BackendUnavailable(_))));
    }
}
