//! Hierarchical Memory System
//!
//! Memory nodes form a forest. The parent relation lives only in each
//! child's parent ID and is authoritative. Each parent also caches its
//! believed children in a pointer block embedded in its own content, so it
//! can be displayed without a recursive query.
//!
//! # Consistency
//!
//! Create, delete, move and promote change the tree and the pointer block in
//! one transaction. Other writers can still leave a block out of date, and
//! that drift is tolerated until `sync` reconciles it.
//!
//! # Feedback loop
//!
//! `expand` touches every node it returns. Deep display reads therefore
//! raise descendants' access counts, and `hot` reports nodes read more often
//! than their parents as promotion candidates.

mod audit;
mod hierarchical;
mod mutation;
pub mod pointer;
mod promotion;
mod store;
mod summary;
mod sync;
mod telemetry;
mod traversal;
mod types;

pub use types::{
    AccessLogEntry, AccessStats, CreateResult, CycleAudit, CycleFinding, CycleKind, DeleteOptions,
    DeleteResult, Discrepancy, DiscrepancyKind, ExpandedNode, HotCandidate, MemoryNode, MoveResult,
    MoveTarget, NewRootMemory, NewSubMemory, OrphanPolicy, PathNode, PromoteResult, SyncFailure,
    SyncReport, SyncTarget, TreeNode,
};
pub use types::{ACCESS_COUNT_KEY, ACCESS_LOG_KEY, LAST_ACCESSED_KEY, SUMMARY_KEY};

pub use pointer::{ParsedContent, PointerEntry};
pub use summary::{
    settle_summary, AutoApprove, EmbeddingProvider, PreparedSubMemory, SettledSummary,
    SubMemoryDraft, Summarizer, SummaryApproval, SummaryDecision, SummaryProposal, SummaryRequest,
};

pub use hierarchical::HierarchicalMemory;
pub use store::MemoryStore;
