//! Audit logging for state-changing operator actions.
//!
//! Audit events go to the `audit` tracing target so they can be routed or
//! filtered separately from operational logs (`RUST_LOG=audit=info`).

use std::sync::Arc;

use tracing::{info, warn};

/// Audit logger with domain-specific methods.
pub struct OperatorAuditLogger {
    component: String,
    enabled: bool,
}

impl OperatorAuditLogger {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            enabled: true,
        }
    }

    /// Create a noop audit logger (for testing)
    pub fn new_noop() -> Self {
        Self {
            component: String::new(),
            enabled: false,
        }
    }

    // === Bootstrap ===

    pub fn bootstrap_completed(&self, schema: &str, attempts: u32) {
        if self.enabled {
            info!(target: "audit", component = %self.component, schema = %schema, attempts, "Schema registered and ready");
        }
    }

    // === Database events ===

    pub fn database_created(&self, name: &str, owner: &str) {
        if self.enabled {
            info!(target: "audit", component = %self.component, database = %name, owner = %owner, "Database created");
        }
    }

    pub fn owner_changed(&self, name: &str, previous: &str, owner: &str) {
        if self.enabled {
            info!(
                target: "audit",
                component = %self.component,
                database = %name,
                previous = %previous,
                owner = %owner,
                "Database owner changed"
            );
        }
    }

    pub fn database_deleted(&self, name: &str) {
        if self.enabled {
            info!(target: "audit", component = %self.component, database = %name, "Database deleted");
        }
    }

    pub fn reconcile_failed(&self, name: &str, reason: &str) {
        if self.enabled {
            warn!(target: "audit", component = %self.component, database = %name, reason = %reason, "Reconciliation failed");
        }
    }

    // === Stream events ===

    pub fn stream_reconnected(&self, subscription: u64) {
        if self.enabled {
            info!(target: "audit", component = %self.component, subscription, "Subscription reopened");
        }
    }
}

pub fn create_audit_logger(component: &str) -> Arc<OperatorAuditLogger> {
    Arc::new(OperatorAuditLogger::new(component))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_logger_doesnt_panic() {
        let logger = OperatorAuditLogger::new_noop();

        logger.bootstrap_completed("postgresqlconfigs.containerconf.de", 1);
        logger.database_created("shop", "alice");
        logger.owner_changed("shop", "alice", "bob");
        logger.database_deleted("shop");
        logger.reconcile_failed("shop", "connection refused");
        logger.stream_reconnected(2);
    }

    #[test]
    fn test_create_audit_logger() {
        let logger = create_audit_logger("postgresql");
        assert!(logger.enabled);
        assert_eq!(logger.component, "postgresql");
    }
}
