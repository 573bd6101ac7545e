//! Hearth Core Library
//!
//! This crate provides the core functionality for Hearth, including:
//! - Storage (one SQLite database per named instance)
//! - Journal-driven schema migrations
//! - Durable key/value records
//! - Storage actors with serialized, migration-gated operations
//! - Users, posts, and the per-instance counter
//! - Configuration

pub mod actor;
pub mod config;
pub mod domain;
pub mod error;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::actor::{ActorHandle, ActorRegistry, ActorState, StorageLocation};
    pub use crate::config::Config;
    pub use crate::domain::{NewPost, NewUser, NewUserWithPosts, Post, User, UserWithPosts};
    pub use crate::error::{Error, Result};
    pub use crate::storage::MigrationSet;
}
