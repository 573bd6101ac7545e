//! Name → actor registry
//!
//! Actors are constructed lazily on first use. Construction sits behind an
//! async once-cell per name: concurrent callers for the same name wait for
//! the one in-flight construction (including its migrations) and then share
//! its handle. A failed construction leaves the cell empty, so the next call
//! re-instantiates from scratch.
//!
//! Eviction retires a slot before closing it. A retired slot never starts a
//! construction, and eviction waits for one already in flight, so at most one
//! open actor exists per name.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::{error, info};

use super::{ActorHandle, ActorState, StorageActor, validate_instance_name};
use crate::config::Config;
use crate::storage::{Database, DatabaseConfig, MigrationSet};
use crate::{Error, Result};

/// Where instance databases live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// Each instance gets a private in-memory database (tests)
    InMemory,
    /// One `<name>.sqlite` file per instance under this directory
    Directory(PathBuf),
}

#[derive(Debug)]
struct Slot {
    cell: OnceCell<ActorHandle>,
    state: RwLock<ActorState>,
    retired: AtomicBool,
}

impl Slot {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            state: RwLock::new(ActorState::Constructing),
            retired: AtomicBool::new(false),
        }
    }

    async fn set_state(&self, state: ActorState) {
        *self.state.write().await = state;
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Stop new constructions, wait for one in flight, and close the result
    async fn retire(&self, name: &str) {
        self.retired.store(true, Ordering::SeqCst);

        let constructed = self
            .cell
            .get_or_try_init(|| async { Err(evicting(name)) })
            .await;
        if let Ok(handle) = constructed {
            handle.close().await;
        }
    }
}

fn evicting(name: &str) -> Error {
    Error::ActorUnavailable {
        name: name.to_string(),
        reason: "instance is being evicted".to_string(),
    }
}

/// Registry of storage actors keyed by instance name
#[derive(Debug)]
pub struct ActorRegistry {
    location: StorageLocation,
    migrations: Arc<MigrationSet>,
    max_connections: u32,
    max_results: u32,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl ActorRegistry {
    pub fn new(location: StorageLocation, migrations: MigrationSet) -> Self {
        Self {
            location,
            migrations: Arc::new(migrations),
            max_connections: 1,
            max_results: 1000,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// In-memory registry using the built-in migrations
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(StorageLocation::InMemory, MigrationSet::builtin()?))
    }

    /// Registry described by the storage and actor sections of `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let migrations = match &config.storage.migrations_dir {
            Some(dir) => MigrationSet::from_dir(dir)?,
            None => MigrationSet::builtin()?,
        };

        Ok(Self::new(
            StorageLocation::Directory(config.storage.data_dir.clone()),
            migrations,
        )
        .with_max_connections(config.storage.max_connections)
        .with_max_results(config.actor.max_results))
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn with_max_results(mut self, max: u32) -> Self {
        self.max_results = max.max(1);
        self
    }

    /// Get the ready actor for `name`, constructing and migrating it if needed
    pub async fn get(&self, name: &str) -> Result<ActorHandle> {
        validate_instance_name(name)?;

        let slot = {
            let mut slots = self.slots.lock().await;
            slots
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Slot::new()))
                .clone()
        };

        if slot.is_retired() {
            return Err(evicting(name));
        }
        if let Some(handle) = slot.cell.get() {
            return Ok(handle.clone());
        }

        let handle = slot
            .cell
            .get_or_try_init(|| async {
                if slot.is_retired() {
                    return Err(evicting(name));
                }
                self.instantiate(name, &slot).await
            })
            .await?;
        Ok(handle.clone())
    }

    async fn instantiate(&self, name: &str, slot: &Slot) -> Result<ActorHandle> {
        slot.set_state(ActorState::Constructing).await;
        info!(instance = %name, "Constructing storage actor");

        let opened = async {
            let db = Database::new(self.database_config(name)).await?;
            slot.set_state(ActorState::Migrating).await;
            StorageActor::open(name, db, self.migrations.clone(), self.max_results).await
        }
        .await;

        match opened {
            Ok(actor) => {
                slot.set_state(ActorState::Ready).await;
                Ok(ActorHandle::new(actor))
            }
            Err(e) => {
                slot.set_state(ActorState::Failed).await;
                error!(instance = %name, error = %e, "Storage actor construction failed");
                Err(Error::ActorUnavailable {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn database_config(&self, name: &str) -> DatabaseConfig {
        match &self.location {
            StorageLocation::InMemory => DatabaseConfig::in_memory(),
            StorageLocation::Directory(dir) => {
                DatabaseConfig::for_instance(dir, name).max_connections(self.max_connections)
            }
        }
    }

    /// Lifecycle state of `name`, if it was ever requested
    pub async fn state(&self, name: &str) -> Option<ActorState> {
        let slot = self.slots.lock().await.get(name).cloned()?;
        let state = *slot.state.read().await;
        Some(state)
    }

    /// Names of instances that are ready, sorted
    pub async fn ready_instances(&self) -> Vec<String> {
        let slots: Vec<(String, Arc<Slot>)> = self
            .slots
            .lock()
            .await
            .iter()
            .map(|(name, slot)| (name.clone(), slot.clone()))
            .collect();

        let mut names: Vec<String> = slots
            .into_iter()
            .filter(|(_, slot)| slot.cell.initialized())
            .map(|(name, _)| name)
            .collect();
        names.sort();
        names
    }

    /// Close `name` and drop it from the registry. Waits for a construction
    /// in flight; handles obtained earlier fail from then on. The next
    /// [`get`](Self::get) re-instantiates it.
    pub async fn evict(&self, name: &str) -> bool {
        let Some(slot) = self.slots.lock().await.get(name).cloned() else {
            return false;
        };

        slot.retire(name).await;

        let mut slots = self.slots.lock().await;
        if slots
            .get(name)
            .is_some_and(|current| Arc::ptr_eq(current, &slot))
        {
            slots.remove(name);
        }
        info!(instance = %name, "Evicted storage actor");
        true
    }

    /// Close every instance
    pub async fn shutdown(&self) {
        let slots: Vec<(String, Arc<Slot>)> = self.slots.lock().await.drain().collect();
        for (name, slot) in slots {
            slot.retire(&name).await;
            info!(instance = %name, "Closed storage actor");
        }
    }
}
