//! Memory Type Definitions
//!
//! Defines the core types for the hierarchical memory system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shards_core::{Shard, ShardStatus, ShardType};

use super::pointer::{self, PointerEntry};
use crate::{SDKError, SDKResult};

/// Metadata key holding the number of recorded accesses
pub const ACCESS_COUNT_KEY: &str = "access_count";
/// Metadata key holding the most recent access timestamp
pub const LAST_ACCESSED_KEY: &str = "last_accessed";
/// Metadata key holding the bounded access log
pub const ACCESS_LOG_KEY: &str = "access_log";
/// Metadata key holding the summary accepted when the node was attached
pub const SUMMARY_KEY: &str = "summary";

// ─────────────────────────────────────────────────────────────────────────────
// Nodes and Telemetry
// ─────────────────────────────────────────────────────────────────────────────

/// One recorded read of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub at: DateTime<Utc>,
    pub by: String,
    pub depth: usize,
}

/// Access telemetry stored in a node's metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessStats {
    pub access_count: u64,
    pub last_accessed: Option<DateTime<Utc>>,
    /// Newest first
    pub access_log: Vec<AccessLogEntry>,
}

impl AccessStats {
    /// Read telemetry fields from a metadata object. Missing or mistyped
    /// fields read as their empty value.
    pub fn from_metadata(metadata: &serde_json::Map<String, serde_json::Value>) -> Self {
        let access_count = metadata
            .get(ACCESS_COUNT_KEY)
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let last_accessed = metadata
            .get(LAST_ACCESSED_KEY)
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let access_log = metadata
            .get(ACCESS_LOG_KEY)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        Self {
            access_count,
            last_accessed,
            access_log,
        }
    }
}

/// A hierarchical memory record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryNode {
    pub id: String,
    pub title: String,
    /// Content with the pointer block stripped; the raw content when the
    /// block is malformed
    pub body: String,
    /// Pointer entries as the node believes them to be
    pub pointers: Vec<PointerEntry>,
    /// Parse failure of the pointer block, if any
    pub pointer_error: Option<String>,
    pub labels: Vec<String>,
    pub status: ShardStatus,
    pub parent_id: Option<String>,
    /// Summary accepted when the node was last attached to a parent
    pub summary: Option<String>,
    pub access: AccessStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemoryNode {
    /// Convert a stored shard, rejecting anything that is not a memory
    pub fn from_shard(shard: Shard) -> SDKResult<Self> {
        if shard.shard_type != ShardType::Memory {
            return Err(SDKError::wrong_type(
                shard.id,
                ShardType::Memory.as_str(),
                shard.shard_type.as_str(),
            ));
        }

        let (body, pointers, pointer_error) = match pointer::parse(&shard.content) {
            Ok(parsed) => (parsed.main, parsed.entries, None),
            Err(e) => (shard.content.clone(), Vec::new(), Some(e.to_string())),
        };

        Ok(Self {
            access: AccessStats::from_metadata(&shard.metadata),
            summary: shard
                .metadata
                .get(SUMMARY_KEY)
                .and_then(|v| v.as_str())
                .map(String::from),
            id: shard.id,
            title: shard.title,
            body,
            pointers,
            pointer_error,
            labels: shard.labels,
            status: shard.status,
            parent_id: shard.parent_id,
            created_at: millis_to_datetime(shard.created_at),
            updated_at: millis_to_datetime(shard.updated_at),
        })
    }
}

pub(crate) fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Mutation Inputs and Results
// ─────────────────────────────────────────────────────────────────────────────

/// Input for creating a parentless memory
#[derive(Debug, Clone, Default)]
pub struct NewRootMemory {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub embedding: Option<Vec<f32>>,
}

/// Input for creating a memory under an existing parent
#[derive(Debug, Clone, Default)]
pub struct NewSubMemory {
    pub parent_id: String,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    /// Final, already-approved summary written into the parent's pointer block
    pub summary: String,
    /// Precomputed embedding, threaded through to storage
    pub embedding: Option<Vec<f32>>,
    /// Create even when the new depth reaches the soft limit
    pub force: bool,
}

/// Result of a create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResult {
    pub id: String,
    pub summary: String,
    pub depth: usize,
}

/// What happens to the children of a node removed without `recursive`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Refuse to delete a node that still has children
    #[default]
    Reject,
    /// Turn the children into roots
    Detach,
}

/// Options for delete
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    pub recursive: bool,
    pub orphans: OrphanPolicy,
}

impl DeleteOptions {
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            orphans: OrphanPolicy::Reject,
        }
    }
}

/// Result of a delete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    /// Innermost nodes first, the target last
    pub deleted: Vec<String>,
    /// Parent whose pointer block lost its entry for the target
    pub removed_from_parent: Option<String>,
    /// Children turned into roots under `OrphanPolicy::Detach`
    pub detached: Vec<String>,
}

/// Destination of a move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveTarget {
    Parent(String),
    Root,
}

impl MoveTarget {
    pub fn parent_id(&self) -> Option<&str> {
        match self {
            MoveTarget::Parent(id) => Some(id),
            MoveTarget::Root => None,
        }
    }
}

/// Result of a move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResult {
    pub id: String,
    pub old_parent: Option<String>,
    pub new_parent: Option<String>,
}

/// Result of a promote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoteResult {
    pub id: String,
    pub old_parent: Option<String>,
    pub new_parent: Option<String>,
    pub new_depth: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Read Results
// ─────────────────────────────────────────────────────────────────────────────

/// One row of a flat tree listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: String,
    pub title: String,
    pub status: ShardStatus,
    pub parent_id: Option<String>,
    /// Distance from the root of the walk (root = 0)
    pub depth: usize,
    pub access_count: u64,
    pub last_accessed: Option<DateTime<Utc>>,
    /// Real children, regardless of status
    pub child_count: usize,
}

/// A node materialized by an expanding read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandedNode {
    pub id: String,
    pub title: String,
    pub status: ShardStatus,
    pub body: String,
    /// Depth relative to the expansion start (start = 0)
    pub depth: usize,
    /// Real children, present when `expanded` is true
    pub children: Vec<ExpandedNode>,
    /// Own pointer entries, present when the expansion stopped here
    pub pointers: Vec<PointerEntry>,
    pub pointer_error: Option<String>,
    pub expanded: bool,
}

impl ExpandedNode {
    /// Total number of nodes in this subtree, including itself
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(ExpandedNode::count).sum::<usize>()
    }
}

/// One step of a root-to-node path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathNode {
    pub id: String,
    pub title: String,
    /// Root = 0, target = path length - 1
    pub depth: usize,
}

/// A node read more often than its parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotCandidate {
    pub id: String,
    pub title: String,
    pub parent_id: String,
    pub depth: usize,
    pub access_count: u64,
    pub parent_access_count: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Maintenance Results
// ─────────────────────────────────────────────────────────────────────────────

/// Which parents a sync inspects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTarget {
    Parent(String),
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// A real child absent from the pointer block
    MissingPointer,
    /// A pointer entry that no longer resolves to a real child
    StalePointer,
}

/// Divergence between the tree and a parent's pointer block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub parent_id: String,
    pub child_id: String,
    pub title: String,
    pub kind: DiscrepancyKind,
}

/// Repair failure for one parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub parent_id: String,
    pub error: String,
}

/// Outcome of a sync run. Discrepancies describe the state before repair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub parents_checked: usize,
    pub discrepancies: Vec<Discrepancy>,
    /// Parents whose pointer block could not be parsed
    pub malformed: Vec<String>,
    /// Parents whose pointer block was rewritten
    pub repaired: Vec<String>,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    /// Discrepancies found for one parent
    pub fn for_parent<'a>(&'a self, parent_id: &'a str) -> impl Iterator<Item = &'a Discrepancy> + 'a {
        self.discrepancies.iter().filter(move |d| d.parent_id == parent_id)
    }

    pub fn count(&self, kind: DiscrepancyKind) -> usize {
        self.discrepancies.iter().filter(|d| d.kind == kind).count()
    }

    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty() && self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    /// The node is its own ancestor
    Loop,
    /// The ancestor chain did not reach a root within the depth cap
    TooDeep,
}

/// A node whose ancestry is not a finite chain to a root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleFinding {
    pub id: String,
    pub kind: CycleKind,
    /// Ancestor IDs walked, starting with the node itself
    pub chain: Vec<String>,
}

/// Outcome of a cycle audit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleAudit {
    pub nodes_checked: usize,
    pub findings: Vec<CycleFinding>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_access_stats_from_metadata() {
        let metadata = json!({
            "access_count": 3,
            "last_accessed": "2024-01-15T10:30:00Z",
            "access_log": [
                {"at": "2024-01-15T10:30:00Z", "by": "agent-a", "depth": 1}
            ]
        });
        let stats = AccessStats::from_metadata(metadata.as_object().unwrap());

        assert_eq!(stats.access_count, 3);
        assert!(stats.last_accessed.is_some());
        assert_eq!(stats.access_log.len(), 1);
        assert_eq!(stats.access_log[0].by, "agent-a");
    }

    #[test]
    fn test_access_stats_defaults() {
        let stats = AccessStats::from_metadata(&serde_json::Map::new());
        assert_eq!(stats, AccessStats::default());
    }

    #[test]
    fn test_from_shard_rejects_other_types() {
        let shard = Shard {
            id: "t1".into(),
            project: "p".into(),
            shard_type: ShardType::Task,
            title: "Task".into(),
            content: String::new(),
            content_hash: String::new(),
            status: ShardStatus::Open,
            parent_id: None,
            labels: Vec::new(),
            metadata: serde_json::Map::new(),
            created_at: 0,
            updated_at: 0,
        };
        let err = MemoryNode::from_shard(shard).unwrap_err();
        assert!(err.is_wrong_type());
    }
}
