//! SDK Error Types
//!
//! Defines error types for the Shards SDK.

use thiserror::Error;

/// SDK Result type alias
pub type SDKResult<T> = Result<T, SDKError>;

/// SDK errors
#[derive(Debug, Error)]
pub enum SDKError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Shard store error
    #[error("store error: {0}")]
    Core(shards_core::Error),

    /// Node or parent does not exist
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    /// Target exists but is not the expected kind of record
    #[error("{id} is a {actual}, expected a {expected}")]
    WrongType {
        id: String,
        expected: String,
        actual: String,
    },

    /// Pointer block present but unparsable
    #[error("malformed pointer block: {message}")]
    MalformedBlock { message: String },

    /// Re-parenting would create a cycle or is a self-reference
    #[error("cannot move {id} under {parent_id}: {reason}")]
    CycleRejected {
        id: String,
        parent_id: String,
        reason: String,
    },

    /// Create would pass the soft depth threshold without a bypass
    #[error("depth {depth} reaches the soft limit of {limit}; pass force to create anyway")]
    DepthExceeded { depth: usize, limit: usize },

    /// Invalid operation
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl From<shards_core::Error> for SDKError {
    fn from(err: shards_core::Error) -> Self {
        match err {
            shards_core::Error::ShardNotFound(id) => Self::not_found("Shard", id),
            shards_core::Error::Database(e) => Self::Database(e),
            other => Self::Core(other),
        }
    }
}

impl SDKError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create a wrong type error
    pub fn wrong_type(
        id: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::WrongType {
            id: id.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a malformed pointer block error
    pub fn malformed_block(message: impl Into<String>) -> Self {
        Self::MalformedBlock {
            message: message.into(),
        }
    }

    /// Create a cycle rejection error
    pub fn cycle_rejected(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CycleRejected {
            id: id.into(),
            parent_id: parent_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid operation error
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Check if this error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_wrong_type(&self) -> bool {
        matches!(self, Self::WrongType { .. })
    }

    pub fn is_malformed_block(&self) -> bool {
        matches!(self, Self::MalformedBlock { .. })
    }

    pub fn is_cycle_rejected(&self) -> bool {
        matches!(self, Self::CycleRejected { .. })
    }

    pub fn is_depth_exceeded(&self) -> bool {
        matches!(self, Self::DepthExceeded { .. })
    }
}
