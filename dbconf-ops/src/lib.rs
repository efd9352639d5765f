//! dbconf-ops: database operations for the dbconf operator.
//!
//! The operator never speaks SQL itself. Everything it needs from a database
//! server goes through [`DatabaseOps`]:
//! - create a database for an owner
//! - change the owner of an existing database
//! - delete a database
//! - list the managed databases with their current owner
//!
//! Implementations:
//! - [`PostgresOps`]: PostgreSQL via sqlx
//! - [`MySqlOps`]: MySQL via sqlx, ownership modelled as schema grants
//! - [`MemoryOps`]: in-process table for tests and dev mode

pub mod error;
pub mod ident;
pub mod memory;
pub mod mysql;
pub mod postgres;

use async_trait::async_trait;

pub use error::{OpsError, Result};
pub use memory::{MemoryOps, OpRecord};
pub use mysql::MySqlOps;
pub use postgres::PostgresOps;

/// A database as it currently exists on the server.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Database {
    pub name: String,
    pub owner: String,
}

impl Database {
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
        }
    }
}

/// Operations against a database server.
///
/// Every method must tolerate redundant calls: creating a database that
/// already exists or deleting one that is gone is not an error.
#[async_trait]
pub trait DatabaseOps: Send + Sync {
    /// Create `name` owned by `owner`, creating the owner first if needed.
    async fn create_database(&self, name: &str, owner: &str) -> Result<()>;

    /// Make `owner` the owner of `name`, creating the owner first if needed.
    async fn change_owner(&self, name: &str, owner: &str) -> Result<()>;

    /// Drop `name` if it exists.
    async fn delete_database(&self, name: &str) -> Result<()>;

    /// List managed databases. System databases are never returned.
    async fn list_databases(&self) -> Result<Vec<Database>>;
}

#[async_trait]
impl<T: DatabaseOps + ?Sized> DatabaseOps for std::sync::Arc<T> {
    async fn create_database(&self, name: &str, owner: &str) -> Result<()> {
        (**self).create_database(name, owner).await
    }

    async fn change_owner(&self, name: &str, owner: &str) -> Result<()> {
        (**self).change_owner(name, owner).await
    }

    async fn delete_database(&self, name: &str) -> Result<()> {
        (**self).delete_database(name).await
    }

    async fn list_databases(&self) -> Result<Vec<Database>> {
        (**self).list_databases().await
    }
}
