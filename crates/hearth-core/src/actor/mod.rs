//! Storage actors
//!
//! Lifecycle of one instance:
//!
//! ```text
//! Constructing ──► Migrating ──► Ready
//!       │              │
//!       └──────────────┴──► Failed
//! ```
//!
//! Operations are only reachable through an [`ActorHandle`], and a handle
//! only exists once its actor reached `Ready`. Every call on a handle takes
//! the instance lock for its whole duration, so calls against one instance
//! never interleave while different instances run independently.

pub mod counter;
pub mod registry;
pub mod storage_actor;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::domain::{NewPost, NewUser, Post, User, UserWithPosts};
use crate::storage::MigrationStatus;
use crate::{Error, Result};

pub use counter::{COUNTER_KEY, Counter};
pub use registry::{ActorRegistry, StorageLocation};
pub use storage_actor::StorageActor;

const MAX_INSTANCE_NAME_LEN: usize = 64;

/// Lifecycle state of a named instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorState {
    Constructing,
    Migrating,
    Ready,
    Failed,
}

/// Check that `name` can address an instance (and name its database file)
pub fn validate_instance_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_INSTANCE_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInstanceName(name.to_string()))
    }
}

/// Serialized access to a ready [`StorageActor`]
///
/// Once the registry closes the actor (eviction, shutdown) every call on
/// this handle and its clones fails with [`Error::ActorUnavailable`].
#[derive(Debug, Clone)]
pub struct ActorHandle {
    name: Arc<str>,
    actor: Arc<Mutex<Option<StorageActor>>>,
}

impl ActorHandle {
    pub(crate) fn new(actor: StorageActor) -> Self {
        Self {
            name: Arc::from(actor.name()),
            actor: Arc::new(Mutex::new(Some(actor))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lock the actor for one operation
    async fn lock(&self) -> Result<MappedMutexGuard<'_, StorageActor>> {
        let guard = self.actor.lock().await;
        MutexGuard::try_map(guard, Option::as_mut).map_err(|_| Error::ActorUnavailable {
            name: self.name.to_string(),
            reason: "actor was closed".to_string(),
        })
    }

    pub async fn fetch_users(&self) -> Result<Vec<User>> {
        self.lock().await?.fetch_users().await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<Option<i64>> {
        self.lock().await?.create_user(user).await
    }

    pub async fn fetch_posts(&self) -> Result<Vec<Post>> {
        self.lock().await?.fetch_posts().await
    }

    pub async fn fetch_user_posts(&self) -> Result<Vec<UserWithPosts>> {
        self.lock().await?.fetch_user_posts().await
    }

    pub async fn create_user_and_posts(
        &self,
        user: &NewUser,
        posts: &[NewPost],
    ) -> Result<UserWithPosts> {
        self.lock().await?.create_user_and_posts(user, posts).await
    }

    pub async fn get_value(&self) -> Result<i64> {
        Ok(self.lock().await?.get_value())
    }

    pub async fn increment(&self, amount: i64) -> Result<i64> {
        self.lock().await?.increment(amount).await
    }

    pub async fn decrement(&self, amount: i64) -> Result<i64> {
        self.lock().await?.decrement(amount).await
    }

    pub async fn health_check(&self) -> Result<()> {
        self.lock().await?.health_check().await
    }

    pub async fn migration_status(&self) -> Result<MigrationStatus> {
        self.lock().await?.migration_status().await
    }

    /// Take the actor out and close its database; waits for the running call
    pub(crate) async fn close(&self) {
        let actor = self.actor.lock().await.take();
        if let Some(actor) = actor {
            actor.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_names() {
        let longest = "x".repeat(64);
        let too_long = "x".repeat(65);
        for name in ["example", "tenant-42", "A_b-C", longest.as_str()] {
            assert!(validate_instance_name(name).is_ok(), "{name} should be valid");
        }
        for name in ["", "../etc", "has space", "dot.name", too_long.as_str(), "名前"] {
            assert!(validate_instance_name(name).is_err(), "{name} should be invalid");
        }
    }

    #[test]
    fn test_actor_state_serializes_snake_case() {
        let json = serde_json::to_string(&ActorState::Migrating).unwrap();
        assert_eq!(json, "\"migrating\"");
    }

    #[test]
    fn test_handle_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ActorHandle>();
        assert_send_sync::<ActorRegistry>();
    }
}
