//! The storage actor
//!
//! One actor owns one instance database. It can only be built through
//! [`StorageActor::open`], which runs every pending migration first, so an
//! actor value always sees a fully migrated schema. Serialization of calls is
//! the job of [`ActorHandle`](super::ActorHandle).

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::counter::Counter;
use crate::domain::{NewPost, NewUser, Post, User, UserWithPosts, repository};
use crate::storage::{
    Database, MigrationSet, MigrationStatus, SqliteRecordStore, apply_migrations, migration_status,
};
use crate::{Error, Result};

/// Single-writer owner of one instance's database and counter
#[derive(Debug)]
pub struct StorageActor {
    name: String,
    db: Database,
    migrations: Arc<MigrationSet>,
    counter: Counter,
    max_results: u32,
}

impl StorageActor {
    /// Migrate `db` and load cached state. On failure the database is closed.
    pub async fn open(
        name: &str,
        db: Database,
        migrations: Arc<MigrationSet>,
        max_results: u32,
    ) -> Result<Self> {
        match Self::prepare(&db, &migrations).await {
            Ok(counter) => {
                info!(instance = %name, counter = counter.value(), "Storage actor ready");
                Ok(Self {
                    name: name.to_string(),
                    db,
                    migrations,
                    counter,
                    max_results,
                })
            }
            Err(e) => {
                warn!(instance = %name, error = %e, "Storage actor failed to open");
                db.close().await;
                Err(e)
            }
        }
    }

    async fn prepare(db: &Database, migrations: &MigrationSet) -> Result<Counter> {
        apply_migrations(db.pool(), migrations).await?;
        let records = SqliteRecordStore::open(db.pool().clone()).await?;
        Counter::load(Arc::new(records)).await
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All users in insertion order
    pub async fn fetch_users(&self) -> Result<Vec<User>> {
        repository::list_users(self.db.pool(), self.max_results).await
    }

    /// Insert one user, returning its id, or `None` when no row was produced
    pub async fn create_user(&self, user: &NewUser) -> Result<Option<i64>> {
        let created = repository::insert_user(self.db.pool(), user).await?;
        match &created {
            Some(row) => debug!(instance = %self.name, user_id = row.id, "Created user"),
            None => debug!(instance = %self.name, "User insert returned no row"),
        }
        Ok(created.map(|row| row.id))
    }

    /// All posts in insertion order
    pub async fn fetch_posts(&self) -> Result<Vec<Post>> {
        repository::list_posts(self.db.pool(), self.max_results).await
    }

    /// Every user with the posts it authored
    pub async fn fetch_user_posts(&self) -> Result<Vec<UserWithPosts>> {
        let mut conn = self.db.pool().acquire().await?;
        let users = repository::list_users(&mut *conn, self.max_results).await?;

        let mut result = Vec::with_capacity(users.len());
        for user in users {
            let posts = repository::list_posts_by_author(&mut *conn, user.id, self.max_results).await?;
            result.push(UserWithPosts { user, posts });
        }
        Ok(result)
    }

    /// Create a user and its posts atomically.
    ///
    /// The user insert and the batched post insert share one transaction; if
    /// the user produces no row or any statement fails, nothing is kept.
    pub async fn create_user_and_posts(
        &self,
        user: &NewUser,
        posts: &[NewPost],
    ) -> Result<UserWithPosts> {
        let mut tx = self.db.pool().begin().await?;

        let Some(created) = repository::insert_user(&mut *tx, user).await? else {
            tx.rollback().await?;
            return Err(Error::InsertReturnedEmpty("users".to_string()));
        };

        // Dropping `tx` on error rolls back the user insert as well
        let posts = repository::insert_posts(&mut *tx, created.id, posts).await?;

        tx.commit().await?;

        info!(
            instance = %self.name,
            user_id = created.id,
            posts = posts.len(),
            "Created user with posts"
        );

        Ok(UserWithPosts {
            user: created,
            posts,
        })
    }

    /// The cached counter value
    pub fn get_value(&self) -> i64 {
        self.counter.value()
    }

    pub async fn increment(&mut self, amount: i64) -> Result<i64> {
        self.counter.increment(amount).await
    }

    pub async fn decrement(&mut self, amount: i64) -> Result<i64> {
        self.counter.decrement(amount).await
    }

    pub async fn health_check(&self) -> Result<()> {
        self.db.health_check().await
    }

    pub async fn migration_status(&self) -> Result<MigrationStatus> {
        migration_status(self.db.pool(), &self.migrations).await
    }

    /// Close the underlying pool
    pub async fn close(&self) {
        self.db.close().await;
        debug!(instance = %self.name, "Storage actor closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Journal, JournalEntry};
    use std::collections::HashMap;

    async fn open_actor() -> StorageActor {
        let db = Database::in_memory().await.expect("Failed to create database");
        StorageActor::open(
            "test",
            db,
            Arc::new(MigrationSet::builtin().unwrap()),
            1000,
        )
        .await
        .expect("Failed to open actor")
    }

    #[tokio::test]
    async fn test_open_runs_migrations() {
        let actor = open_actor().await;
        let status = actor.migration_status().await.unwrap();
        assert!(!status.needs_migration);
        assert!(actor.fetch_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_fails_on_broken_migration() {
        let db = Database::in_memory().await.unwrap();
        let journal = Journal {
            version: None,
            dialect: Some("sqlite".to_string()),
            entries: vec![JournalEntry {
                idx: 0,
                when: 0,
                tag: "0000_broken".to_string(),
                breakpoints: false,
            }],
        };
        let migrations = HashMap::from([(
            "0000_broken".to_string(),
            "CREATE TABLE".to_string(),
        )]);
        let set = MigrationSet::new(journal, migrations).unwrap();

        let err = StorageActor::open("broken", db, Arc::new(set), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MigrationFailed { .. }));
    }

    #[tokio::test]
    async fn test_create_user_returns_id() {
        let actor = open_actor().await;
        let id = actor
            .create_user(&NewUser::new("Taro", 24, "taro@example.com"))
            .await
            .unwrap();
        assert!(id.is_some());

        let users = actor.fetch_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(Some(users[0].id), id);
    }

    #[tokio::test]
    async fn test_create_user_empty_sentinel() {
        let actor = open_actor().await;
        let user = NewUser::new("Taro", 24, "taro@example.com");
        actor.create_user(&user).await.unwrap();

        let again = actor.create_user(&user).await.unwrap();
        assert_eq!(again, None);
        assert_eq!(actor.fetch_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_user_and_posts_duplicate_user_keeps_nothing() {
        let actor = open_actor().await;
        let user = NewUser::new("Taro", 24, "taro@example.com");
        actor.create_user(&user).await.unwrap();

        let err = actor
            .create_user_and_posts(&user, &[NewPost::new("lost")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsertReturnedEmpty(_)));
        assert!(actor.fetch_posts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counter_round_trip() {
        let mut actor = open_actor().await;
        assert_eq!(actor.get_value(), 0);
        assert_eq!(actor.increment(1).await.unwrap(), 1);
        assert_eq!(actor.increment(1).await.unwrap(), 2);
        assert_eq!(actor.decrement(1).await.unwrap(), 1);
        assert_eq!(actor.get_value(), 1);
    }
}
