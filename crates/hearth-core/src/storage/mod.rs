//! Storage layer - SQLite per instance
//!
//! # Architecture
//!
//! - `database`: Connection pool management for one instance file
//! - `migrations`: Journal-driven schema migrations
//! - `records`: Durable key/value records beside the relational tables
//!
//! # Usage
//!
//! ```ignore
//! use hearth_core::storage::{apply_migrations, Database, MigrationSet};
//!
//! let db = Database::in_memory().await?;
//! apply_migrations(db.pool(), &MigrationSet::builtin()?).await?;
//! ```

pub mod database;
pub mod migrations;
pub mod records;

// Re-export commonly used types
pub use database::{Database, DatabaseConfig, instance_database_path};
pub use migrations::{
    AppliedMigration, Journal, JournalEntry, MigrationSet, MigrationStatus, STATEMENT_BREAKPOINT,
    applied_migrations, apply_migrations, migration_status,
};
pub use records::{RecordStore, SqliteRecordStore};
