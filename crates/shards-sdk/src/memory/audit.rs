//! Cycle audit.
//!
//! Move and promote check ancestry inside the writing transaction, which
//! holds against writers sharing this database's lock but is not a hard
//! guarantee. The audit finds any loop that slipped through after the fact.

use std::collections::HashSet;

use shards_core::db;

use super::types::{CycleAudit, CycleFinding, CycleKind};
use super::HierarchicalMemory;
use crate::SDKResult;

impl HierarchicalMemory {
    /// Walk every node's ancestor chain and report chains that revisit the
    /// node or do not reach a root within the traversal cap. Read-only.
    pub async fn audit_cycles(&self) -> SDKResult<CycleAudit> {
        let cap = self.config().traversal_depth_cap;
        let store = &self.store;

        let audit = self
            .read(|conn| {
                let ids = store.all_ids(conn)?;
                let mut audit = CycleAudit {
                    nodes_checked: ids.len(),
                    findings: Vec::new(),
                };

                for id in ids {
                    let chain = db::ancestors(conn, &id, cap)?;
                    let reached_root = chain.last().is_some_and(|link| link.parent_id.is_none());
                    let loops = chain.iter().skip(1).any(|link| link.id == id);

                    let kind = if loops {
                        CycleKind::Loop
                    } else if !reached_root {
                        CycleKind::TooDeep
                    } else {
                        continue;
                    };

                    let mut seen = HashSet::new();
                    let chain: Vec<String> = chain
                        .into_iter()
                        .map(|link| link.id)
                        .take_while(|link_id| seen.insert(link_id.clone()))
                        .collect();

                    tracing::warn!(id = %id, kind = ?kind, chain_len = chain.len(), "Memory ancestry is not a finite chain to a root");
                    audit.findings.push(CycleFinding { id, kind, chain });
                }
                Ok(audit)
            })
            .await?;

        tracing::info!(
            nodes = audit.nodes_checked,
            findings = audit.findings.len(),
            "Cycle audit complete"
        );
        Ok(audit)
    }
}
