//! dbconf operator: keeps databases on a PostgreSQL or MySQL server in line
//! with `PostgreSQLConfig` / `MySQLConfig` custom resources.

pub mod audit;
pub mod crd;
pub mod driver;
pub mod error;
pub mod orphan;
pub mod reconciler;
pub mod record;
pub mod registrar;
pub mod shutdown;
pub mod store;

pub use audit::{create_audit_logger, OperatorAuditLogger};
pub use crd::{DesiredState, MySQLConfig, PostgreSQLConfig};
pub use driver::{CycleReport, Driver, DriverConfig, DriverState, Mode};
pub use error::{Error, Result};
pub use orphan::{OrphanCollector, ProtectedNames};
pub use reconciler::{Intent, Outcome, Reconciler};
pub use record::{DesiredRecord, ValidationError};
pub use registrar::{CrdRegistrar, Readiness, SchemaRegistrar};
pub use shutdown::{Shutdown, ShutdownListener};
pub use store::{Event, EventStream, KubeStore, ResourceStore};
