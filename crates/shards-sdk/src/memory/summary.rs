//! Summary and Embedding Collaborators
//!
//! Creating a sub-memory needs a summary for the parent's pointer block and
//! optionally an embedding. Both come from outside this crate: a summarizer
//! proposes text, a human or agent approves, edits or cancels it, and an
//! embedding provider turns title and body into a vector. The mutation
//! itself only ever sees the final values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::NewSubMemory;
use super::HierarchicalMemory;
use crate::SDKResult;

/// What a summarizer is shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub parent_id: String,
    pub parent_title: String,
    /// Parent content without its pointer block
    pub parent_body: String,
    pub title: String,
    pub body: String,
}

/// A summarizer's suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryProposal {
    pub summary: String,
    /// Advisory rewrite of the parent's text. Never applied automatically.
    pub parent_edit: Option<String>,
}

/// Outcome of reviewing a proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryDecision {
    Approve,
    Edit(String),
    Cancel,
}

/// Produces summaries for new sub-memories.
///
/// Uses `?Send` like the rest of the SDK, which runs on a single-threaded
/// rusqlite connection.
#[async_trait(?Send)]
pub trait Summarizer {
    async fn propose(&self, request: &SummaryRequest) -> SDKResult<SummaryProposal>;
}

/// Approval step between a proposal and the create call
#[async_trait(?Send)]
pub trait SummaryApproval {
    async fn review(&self, request: &SummaryRequest, proposal: &SummaryProposal) -> SDKResult<SummaryDecision>;
}

/// Produces embedding vectors for memory text
#[async_trait(?Send)]
pub trait EmbeddingProvider {
    async fn embed(&self, text: &str) -> SDKResult<Vec<f32>>;
}

/// Approval step that accepts every proposal unchanged
pub struct AutoApprove;

#[async_trait(?Send)]
impl SummaryApproval for AutoApprove {
    async fn review(&self, _request: &SummaryRequest, _proposal: &SummaryProposal) -> SDKResult<SummaryDecision> {
        Ok(SummaryDecision::Approve)
    }
}

/// Final summary plus the advisory parent edit, if one was proposed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledSummary {
    pub summary: String,
    pub parent_edit: Option<String>,
}

/// Run propose then review. Returns `None` when the reviewer cancels.
pub async fn settle_summary(
    summarizer: &dyn Summarizer,
    approval: &dyn SummaryApproval,
    request: &SummaryRequest,
) -> SDKResult<Option<SettledSummary>> {
    let proposal = summarizer.propose(request).await?;
    let summary = match approval.review(request, &proposal).await? {
        SummaryDecision::Approve => proposal.summary,
        SummaryDecision::Edit(edited) => edited,
        SummaryDecision::Cancel => {
            tracing::debug!(parent = %request.parent_id, title = %request.title, "Summary cancelled");
            return Ok(None);
        }
    };

    Ok(Some(SettledSummary {
        summary,
        parent_edit: proposal.parent_edit,
    }))
}

/// Caller-side description of a sub-memory before its summary is settled
#[derive(Debug, Clone, Default)]
pub struct SubMemoryDraft {
    pub parent_id: String,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    /// Explicit summary; skips the summarizer when set
    pub summary: Option<String>,
    pub force: bool,
}

/// A create input ready for `create_sub_memory`
#[derive(Debug, Clone)]
pub struct PreparedSubMemory {
    pub input: NewSubMemory,
    pub parent_edit: Option<String>,
}

impl HierarchicalMemory {
    /// Settle the summary and compute the embedding for a draft.
    ///
    /// Returns `None` if the summary was cancelled. Nothing is written; pass
    /// `input` to `create_sub_memory` to commit.
    pub async fn prepare_sub_memory(
        &self,
        draft: SubMemoryDraft,
        summarizer: &dyn Summarizer,
        approval: &dyn SummaryApproval,
        embedder: Option<&dyn EmbeddingProvider>,
    ) -> SDKResult<Option<PreparedSubMemory>> {
        let settled = match draft.summary {
            Some(summary) => SettledSummary {
                summary,
                parent_edit: None,
            },
            None => {
                let parent = self.get(&draft.parent_id).await?;
                let request = SummaryRequest {
                    parent_id: parent.id,
                    parent_title: parent.title,
                    parent_body: parent.body,
                    title: draft.title.clone(),
                    body: draft.body.clone(),
                };
                match settle_summary(summarizer, approval, &request).await? {
                    Some(settled) => settled,
                    None => return Ok(None),
                }
            }
        };

        let embedding = match embedder {
            Some(embedder) => Some(embedder.embed(&format!("{}\n\n{}", draft.title, draft.body)).await?),
            None => None,
        };

        Ok(Some(PreparedSubMemory {
            input: NewSubMemory {
                parent_id: draft.parent_id,
                title: draft.title,
                body: draft.body,
                labels: draft.labels,
                summary: settled.summary,
                embedding,
                force: draft.force,
            },
            parent_edit: settled.parent_edit,
        }))
    }
}
