//! Shared types for shards-core.
//!
//! Every record in the store is a shard. Tasks, messages, knowledge and
//! memories share one table and differ only by `shard_type`.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of record stored in a shard row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardType {
    Task,
    Message,
    Knowledge,
    Memory,
}

impl ShardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShardType::Task => "task",
            ShardType::Message => "message",
            ShardType::Knowledge => "knowledge",
            ShardType::Memory => "memory",
        }
    }
}

impl std::fmt::Display for ShardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ShardType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(ShardType::Task),
            "message" => Ok(ShardType::Message),
            "knowledge" => Ok(ShardType::Knowledge),
            "memory" => Ok(ShardType::Memory),
            _ => Err(format!("Invalid shard type: {}", s)),
        }
    }
}

/// Lifecycle status of a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardStatus {
    #[default]
    Open,
    Closed,
    Deferred,
}

impl ShardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShardStatus::Open => "open",
            ShardStatus::Closed => "closed",
            ShardStatus::Deferred => "deferred",
        }
    }
}

impl std::fmt::Display for ShardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ShardStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ShardStatus::Open),
            "closed" => Ok(ShardStatus::Closed),
            "deferred" => Ok(ShardStatus::Deferred),
            _ => Err(format!("Invalid shard status: {}", s)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entity Types
// ─────────────────────────────────────────────────────────────────────────────

/// A stored record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shard {
    pub id: String,
    pub project: String,
    pub shard_type: ShardType,
    pub title: String,
    pub content: String,
    pub content_hash: String,
    pub status: ShardStatus,
    pub parent_id: Option<String>,
    pub labels: Vec<String>,
    /// Free-form metadata object; memory telemetry lives here
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Lightweight link used by ancestor and descendant queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardLink {
    pub id: String,
    pub parent_id: Option<String>,
    pub title: String,
    /// Steps away from the node the query started at
    pub distance: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Input Types (for creating entities)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NewShard {
    pub project: String,
    pub shard_type: ShardType,
    pub title: String,
    pub content: String,
    pub parent_id: Option<String>,
    pub labels: Vec<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Precomputed embedding vector, stored as little-endian f32 bytes
    pub embedding: Option<Vec<f32>>,
}

impl NewShard {
    /// A bare shard of the given type with no parent, labels or metadata
    pub fn new(
        project: impl Into<String>,
        shard_type: ShardType,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            shard_type,
            title: title.into(),
            content: content.into(),
            parent_id: None,
            labels: Vec::new(),
            metadata: serde_json::Map::new(),
            embedding: None,
        }
    }
}
