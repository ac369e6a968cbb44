//! Error types for shards-core.

use thiserror::Error;

/// Result type alias using shards-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for shard store operations
#[derive(Error, Debug)]
pub enum Error {
    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database not found. Set SHARDS_DATABASE_PATH or run from project directory.")]
    DatabaseNotFound,

    #[error("Shard not found: {0}")]
    ShardNotFound(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid shard type: {0}")]
    InvalidShardType(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
