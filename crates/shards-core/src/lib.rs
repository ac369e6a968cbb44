//! shards-core - Shared Record Store for Agents
//!
//! Everything an agent persists (tasks, messages, knowledge, memories) is a
//! uniformly-typed record called a *shard*, stored in a single SQLite table.
//! This crate provides:
//!
//! - **types** - Shard record, status and type enums, input types
//! - **db** - Schema migration, connection setup and shard queries
//! - **error** - Error types
//!
//! Higher-level subsystems such as hierarchical memory live in
//! `shards-sdk` and build on these primitives.

pub mod db;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{NewShard, Shard, ShardLink, ShardStatus, ShardType};
