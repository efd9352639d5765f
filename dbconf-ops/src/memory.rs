//! In-process database backend for tests and dev mode.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{OpsError, Result};
use crate::{Database, DatabaseOps};

/// A mutating call seen by [`MemoryOps`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpRecord {
    Create { name: String, owner: String },
    ChangeOwner { name: String, owner: String },
    Delete { name: String },
}

#[derive(Default)]
struct State {
    databases: BTreeMap<String, String>,
    journal: Vec<OpRecord>,
    failing: HashSet<String>,
    unavailable: bool,
    list_calls: usize,
}

/// Database table kept in memory behind a single mutex.
#[derive(Default)]
pub struct MemoryOps {
    state: Mutex<State>,
}

impl MemoryOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given databases already present.
    pub fn with_databases<I>(databases: I) -> Self
    where
        I: IntoIterator<Item = Database>,
    {
        let databases = databases.into_iter().map(|d| (d.name, d.owner)).collect();
        Self {
            state: Mutex::new(State {
                databases,
                ..State::default()
            }),
        }
    }

    /// Current databases, ordered by name.
    pub async fn snapshot(&self) -> Vec<Database> {
        let state = self.state.lock().await;
        state
            .databases
            .iter()
            .map(|(name, owner)| Database::new(name.clone(), owner.clone()))
            .collect()
    }

    /// Owner of `name`, if present.
    pub async fn owner_of(&self, name: &str) -> Option<String> {
        self.state.lock().await.databases.get(name).cloned()
    }

    /// Every mutating call in arrival order.
    pub async fn journal(&self) -> Vec<OpRecord> {
        self.state.lock().await.journal.clone()
    }

    pub async fn clear_journal(&self) {
        self.state.lock().await.journal.clear();
    }

    /// Make every mutating call on `name` fail until [`heal`](Self::heal).
    pub async fn fail_on(&self, name: &str) {
        self.state.lock().await.failing.insert(name.to_string());
    }

    pub async fn heal(&self, name: &str) {
        self.state.lock().await.failing.remove(name);
    }

    /// Number of `list_databases` calls, failed ones included.
    pub async fn list_calls(&self) -> usize {
        self.state.lock().await.list_calls
    }

    /// Make `list_databases` fail as if the server were unreachable.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }
}

fn guard(state: &State, name: &str) -> Result<()> {
    if state.unavailable {
        return Err(OpsError::Unavailable("memory backend offline".to_string()));
    }
    if state.failing.contains(name) {
        return Err(OpsError::Injected(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl DatabaseOps for MemoryOps {
    async fn create_database(&self, name: &str, owner: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        guard(&state, name)?;
        state.journal.push(OpRecord::Create {
            name: name.to_string(),
            owner: owner.to_string(),
        });
        if !state.databases.contains_key(name) {
            debug!(database = %name, owner = %owner, "memory: create");
            state.databases.insert(name.to_string(), owner.to_string());
        }
        Ok(())
    }

    async fn change_owner(&self, name: &str, owner: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        guard(&state, name)?;
        state.journal.push(OpRecord::ChangeOwner {
            name: name.to_string(),
            owner: owner.to_string(),
        });
        debug!(database = %name, owner = %owner, "memory: change owner");
        state.databases.insert(name.to_string(), owner.to_string());
        Ok(())
    }

    async fn delete_database(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        guard(&state, name)?;
        state.journal.push(OpRecord::Delete {
            name: name.to_string(),
        });
        debug!(database = %name, "memory: delete");
        state.databases.remove(name);
        Ok(())
    }

    async fn list_databases(&self) -> Result<Vec<Database>> {
        let mut state = self.state.lock().await;
        state.list_calls += 1;
        if state.unavailable {
            return Err(OpsError::Unavailable("memory backend offline".to_string()));
        }
        Ok(state
            .databases
            .iter()
            .map(|(name, owner)| Database::new(name.clone(), owner.clone()))
            .collect())
    }
}
