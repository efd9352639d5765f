//! Custom resource kinds carrying desired database state.
//!
//! Both kinds live in the `containerconf.de/v1` API group and share the same
//! spec shape. Spec fields default to empty when missing so that a malformed
//! object is rejected by validation instead of failing a whole list call.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::record::DesiredRecord;

/// API group of every dbconf custom resource.
pub const GROUP: &str = "containerconf.de";

/// Maps a custom object onto the record the reconciler works with.
pub trait DesiredState {
    fn desired_record(&self) -> DesiredRecord;
}

/// Desired state of a PostgreSQL database.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "containerconf.de",
    version = "v1",
    kind = "PostgreSQLConfig",
    plural = "postgresqlconfigs",
    singular = "postgresqlconfig",
    namespaced
)]
#[serde(default)]
pub struct PostgreSQLConfigSpec {
    /// Database name to be created.
    pub database: String,
    /// Database owner.
    pub owner: String,
}

/// Desired state of a MySQL database.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "containerconf.de",
    version = "v1",
    kind = "MySQLConfig",
    plural = "mysqlconfigs",
    singular = "mysqlconfig",
    namespaced
)]
#[serde(default)]
pub struct MySQLConfigSpec {
    /// Database name to be created.
    pub database: String,
    /// Account granted all privileges on the database.
    pub owner: String,
}

impl DesiredState for PostgreSQLConfig {
    fn desired_record(&self) -> DesiredRecord {
        DesiredRecord::new(self.spec.database.clone(), self.spec.owner.clone())
    }
}

impl DesiredState for MySQLConfig {
    fn desired_record(&self) -> DesiredRecord {
        DesiredRecord::new(self.spec.database.clone(), self.spec.owner.clone())
    }
}
