//! Database migrations
//!
//! A [`MigrationSet`] pairs a journal (ordered entries) with the SQL for each
//! entry's tag. [`apply_migrations`] executes every entry that is not yet
//! recorded in `_hearth_migrations`, in journal order, one transaction per
//! entry. The on-disk layout follows drizzle-kit:
//!
//! ```text
//! migrations/
//!   meta/_journal.json
//!   0000_create_users.sql
//!   0001_create_posts.sql
//! ```

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Marker separating statements inside a breakpoint migration
pub const STATEMENT_BREAKPOINT: &str = "--> statement-breakpoint";

/// SQL for creating the migrations tracking table
const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _hearth_migrations (
        idx INTEGER PRIMARY KEY NOT NULL,
        tag TEXT NOT NULL UNIQUE,
        hash TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

const BUILTIN_JOURNAL: &str = include_str!("../../migrations/meta/_journal.json");

const BUILTIN_MIGRATIONS: &[(&str, &str)] = &[
    (
        "0000_create_users",
        include_str!("../../migrations/0000_create_users.sql"),
    ),
    (
        "0001_create_posts",
        include_str!("../../migrations/0001_create_posts.sql"),
    ),
];

/// One journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub idx: u32,
    /// Creation time in milliseconds since the epoch
    pub when: i64,
    pub tag: String,
    /// Split the SQL on [`STATEMENT_BREAKPOINT`] and run statements one by one
    pub breakpoints: bool,
}

/// Ordered list of migrations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<String>,
    pub entries: Vec<JournalEntry>,
}

/// Journal plus the SQL for each tag. Immutable once built.
#[derive(Debug, Clone)]
pub struct MigrationSet {
    journal: Journal,
    migrations: HashMap<String, String>,
}

impl MigrationSet {
    /// Build a set, rejecting journals that are out of order or reference missing SQL
    pub fn new(journal: Journal, migrations: HashMap<String, String>) -> Result<Self> {
        validate_journal(&journal, &migrations)?;
        Ok(Self {
            journal,
            migrations,
        })
    }

    /// The migrations compiled into this crate
    pub fn builtin() -> Result<Self> {
        let journal: Journal = serde_json::from_str(BUILTIN_JOURNAL)?;
        let migrations = BUILTIN_MIGRATIONS
            .iter()
            .map(|(tag, sql)| (tag.to_string(), sql.to_string()))
            .collect();
        Self::new(journal, migrations)
    }

    /// Load a drizzle-style migrations directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let journal_path = dir.join("meta").join("_journal.json");
        let contents = std::fs::read_to_string(&journal_path).map_err(|e| {
            Error::InvalidJournal(format!("cannot read {}: {}", journal_path.display(), e))
        })?;
        let journal: Journal = serde_json::from_str(&contents)?;

        let mut migrations = HashMap::new();
        for entry in &journal.entries {
            let sql_path = dir.join(format!("{}.sql", entry.tag));
            match std::fs::read_to_string(&sql_path) {
                Ok(sql) => {
                    migrations.insert(entry.tag.clone(), sql);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(Error::MissingMigration(entry.tag.clone()));
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!(
            dir = %dir.display(),
            entries = journal.entries.len(),
            "Loaded migrations directory"
        );

        Self::new(journal, migrations)
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.journal.entries
    }

    /// Raw SQL for a tag
    pub fn sql(&self, tag: &str) -> Option<&str> {
        self.migrations.get(tag).map(String::as_str)
    }

    /// Statements to execute for an entry, in order
    pub fn statements(&self, entry: &JournalEntry) -> Vec<&str> {
        let Some(sql) = self.sql(&entry.tag) else {
            return Vec::new();
        };

        if entry.breakpoints {
            sql.split(STATEMENT_BREAKPOINT)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect()
        } else if sql.trim().is_empty() {
            Vec::new()
        } else {
            vec![sql]
        }
    }
}

fn validate_journal(journal: &Journal, migrations: &HashMap<String, String>) -> Result<()> {
    if let Some(dialect) = &journal.dialect {
        if dialect != "sqlite" {
            return Err(Error::InvalidJournal(format!(
                "unsupported dialect '{}'",
                dialect
            )));
        }
    }

    let mut tags = HashSet::new();
    let mut previous: Option<u32> = None;

    for entry in &journal.entries {
        if let Some(prev) = previous {
            if entry.idx <= prev {
                return Err(Error::InvalidJournal(format!(
                    "index {} ('{}') does not follow index {}",
                    entry.idx, entry.tag, prev
                )));
            }
        }
        previous = Some(entry.idx);

        if !tags.insert(entry.tag.as_str()) {
            return Err(Error::InvalidJournal(format!(
                "tag '{}' appears more than once",
                entry.tag
            )));
        }

        if !migrations.contains_key(&entry.tag) {
            return Err(Error::MissingMigration(entry.tag.clone()));
        }
    }

    Ok(())
}

/// SHA-256 of a migration's SQL, hex encoded
pub fn hash_sql(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

/// A row of `_hearth_migrations`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub idx: u32,
    pub tag: String,
    pub hash: String,
    pub created_at: i64,
    pub applied_at: DateTime<Utc>,
}

impl AppliedMigration {
    /// Journal `when` of the entry, if it is a representable instant
    pub fn created(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.created_at)
    }
}

/// Apply every pending entry of `set`, in index order.
///
/// Each entry runs in its own transaction together with its bookkeeping row,
/// so a failed statement leaves neither partial schema nor a record behind.
/// Returns the tags applied by this call; empty when already up to date.
pub async fn apply_migrations(pool: &SqlitePool, set: &MigrationSet) -> Result<Vec<String>> {
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let applied: HashMap<u32, AppliedMigration> = applied_migrations(pool)
        .await?
        .into_iter()
        .map(|m| (m.idx, m))
        .collect();

    tracing::info!(
        applied = applied.len(),
        target = set.entries().len(),
        "Checking database migrations"
    );

    let mut newly_applied = Vec::new();

    for entry in set.entries() {
        let sql = set
            .sql(&entry.tag)
            .ok_or_else(|| Error::MissingMigration(entry.tag.clone()))?;
        let hash = hash_sql(sql);

        if let Some(existing) = applied.get(&entry.idx) {
            if existing.tag != entry.tag {
                return Err(Error::InvalidJournal(format!(
                    "index {} was applied as '{}' but the journal now names '{}'",
                    entry.idx, existing.tag, entry.tag
                )));
            }
            if existing.hash != hash {
                tracing::warn!(
                    idx = entry.idx,
                    tag = %entry.tag,
                    "Migration SQL changed after it was applied; not re-applying"
                );
            }
            continue;
        }

        tracing::info!(idx = entry.idx, tag = %entry.tag, "Applying migration");

        let mut tx = pool.begin().await?;

        for statement in set.statements(entry) {
            sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(statement))
                .await
                .map_err(|e| Error::MigrationFailed {
                    tag: entry.tag.clone(),
                    reason: e.to_string(),
                })?;
        }

        sqlx::query("INSERT INTO _hearth_migrations (idx, tag, hash, created_at) VALUES (?, ?, ?, ?)")
            .bind(entry.idx as i64)
            .bind(&entry.tag)
            .bind(&hash)
            .bind(entry.when)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        newly_applied.push(entry.tag.clone());
    }

    if newly_applied.is_empty() {
        tracing::debug!("Database is up to date");
    } else {
        tracing::info!(count = newly_applied.len(), "Database migrations completed");
    }

    Ok(newly_applied)
}

async fn migrations_table_exists(pool: &SqlitePool) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_hearth_migrations'",
    )
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

/// Rows already recorded as applied, in index order
pub async fn applied_migrations(pool: &SqlitePool) -> Result<Vec<AppliedMigration>> {
    if !migrations_table_exists(pool).await? {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        "SELECT idx, tag, hash, created_at, applied_at FROM _hearth_migrations ORDER BY idx",
    )
    .fetch_all(pool)
    .await?;

    let mut applied = Vec::with_capacity(rows.len());
    for row in rows {
        let idx: i64 = row.try_get("idx")?;
        let idx = u32::try_from(idx).map_err(|_| {
            Error::InvalidJournal(format!("applied index {} is out of range", idx))
        })?;
        applied.push(AppliedMigration {
            idx,
            tag: row.try_get("tag")?,
            hash: row.try_get("hash")?,
            created_at: row.try_get("created_at")?,
            applied_at: row.try_get("applied_at")?,
        });
    }
    Ok(applied)
}

/// Get migration status information
pub async fn migration_status(pool: &SqlitePool, set: &MigrationSet) -> Result<MigrationStatus> {
    let applied = applied_migrations(pool).await?;
    let applied_idx: HashSet<u32> = applied.iter().map(|m| m.idx).collect();

    let pending: Vec<String> = set
        .entries()
        .iter()
        .filter(|e| !applied_idx.contains(&e.idx))
        .map(|e| e.tag.clone())
        .collect();

    Ok(MigrationStatus {
        applied: applied.len(),
        last_applied: applied.last().map(|m| m.tag.clone()),
        needs_migration: !pending.is_empty(),
        pending,
    })
}

/// Migration status information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// Number of entries recorded as applied
    pub applied: usize,
    /// Tag of the highest applied entry
    pub last_applied: Option<String>,
    /// Tags still to run, in order
    pub pending: Vec<String>,
    /// Whether migrations need to be run
    pub needs_migration: bool,
}
