//! Shards SDK - Hierarchical Memory for Agents
//!
//! Everything an agent stores (tasks, messages, knowledge, memories) is a
//! shard in one SQLite store. This crate implements the memory subtype's
//! hierarchy on top of it.
//!
//! # Core Modules (from shards-core)
//!
//! - **db** - Direct SQLite access to the shard store
//! - **types** - Shard records and their enums
//!
//! # SDK Modules
//!
//! - **memory** - Parent/child memory trees with embedded pointer blocks,
//!   access telemetry, promotion hints and drift reconciliation
//!
//! # Example
//!
//! ```rust,no_run
//! use shards_sdk::{SDK, SDKConfig};
//! use shards_sdk::memory::SyncTarget;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let sdk = SDK::new(SDKConfig::load()?.with_agent("reviewer"))?;
//!
//!     // Nodes read more often than their parents
//!     for candidate in sdk.memory().hot(1, 10).await? {
//!         println!("{} ({} reads)", candidate.title, candidate.access_count);
//!     }
//!
//!     // Repair pointer blocks that drifted from the tree
//!     let report = sdk.memory().sync(SyncTarget::All, false).await?;
//!     println!("{} parents repaired", report.repaired.len());
//!
//!     Ok(())
//! }
//! ```

// ─────────────────────────────────────────────────────────────────────────────
// Re-export core modules from shards-core
// ─────────────────────────────────────────────────────────────────────────────

/// Database access
pub use shards_core::db;

/// Core types (Shard, NewShard, ShardType, etc.)
pub use shards_core::types;

/// Error types from core
pub use shards_core::error as core_error;

// ─────────────────────────────────────────────────────────────────────────────
// SDK-specific modules
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "memory")]
pub mod memory;

mod config;
mod error;
mod sdk;

// Re-export main SDK types
pub use config::{ConfigValidationError, MemoryConfig, SDKConfig};
pub use error::{SDKError, SDKResult};
pub use sdk::SDK;

// Re-export feature-gated modules
#[cfg(feature = "memory")]
pub use memory::{
    CreateResult, DeleteOptions, DeleteResult, ExpandedNode, HierarchicalMemory, MemoryNode,
    MemoryStore, MoveTarget, NewRootMemory, NewSubMemory, PointerEntry, SyncReport, SyncTarget,
    TreeNode,
};
