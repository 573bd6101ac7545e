//! Error types for Hearth

use thiserror::Error;

/// Result type alias using Hearth's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Hearth error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Instance errors (E001-E099)
    #[error("Invalid instance name '{0}'. Use 1-64 characters from [A-Za-z0-9_-].")]
    InvalidInstanceName(String),

    #[error("Storage actor '{name}' is unavailable: {reason}")]
    ActorUnavailable { name: String, reason: String },

    // Migration errors (E100-E199)
    #[error("Migration '{tag}' failed: {reason}")]
    MigrationFailed { tag: String, reason: String },

    #[error("Invalid migration journal: {0}")]
    InvalidJournal(String),

    #[error("Migration '{0}' is listed in the journal but has no SQL.")]
    MissingMigration(String),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Insert into '{0}' returned no row")]
    InsertReturnedEmpty(String),

    #[error("Counter overflow: {value} + {delta} does not fit in 64 bits")]
    CounterOverflow { value: i64, delta: i64 },

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInstanceName(_) => "E001",
            Self::ActorUnavailable { .. } => "E002",
            Self::MigrationFailed { .. } => "E100",
            Self::InvalidJournal(_) => "E101",
            Self::MissingMigration(_) => "E102",
            Self::DatabaseError(_) => "E400",
            Self::InsertReturnedEmpty(_) => "E401",
            Self::CounterOverflow { .. } => "E402",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Serialization(_) => "E801",
            Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::ActorUnavailable { name, .. } => {
                Some(format!("hearth migrate --instance {}", name))
            }
            Self::MigrationFailed { tag, .. } => {
                Some(format!("Fix the SQL for '{}' and restart the instance", tag))
            }
            Self::InvalidJournal(_) | Self::MissingMigration(_) => {
                Some("Check meta/_journal.json in the migrations directory".to_string())
            }
            Self::ConfigError(_) => Some("hearth config list".to_string()),
            _ => None,
        }
    }

    /// Whether this error was caused by the caller's input rather than the store
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::InvalidInstanceName(_))
    }
}
