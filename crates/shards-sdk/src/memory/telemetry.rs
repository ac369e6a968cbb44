//! Access telemetry.
//!
//! Reads record themselves against the nodes they return. Recording is
//! best-effort: failures are logged and never reach the reader.

use chrono::Utc;

use super::types::{AccessLogEntry, AccessStats};
use super::HierarchicalMemory;
use crate::{SDKError, SDKResult};

impl HierarchicalMemory {
    /// Record one access against a node.
    ///
    /// Increments `access_count`, stamps `last_accessed` and prepends an
    /// entry to the bounded access log. Errors are swallowed.
    pub async fn touch(&self, id: &str, agent: &str, depth: usize) {
        if let Err(e) = self.try_touch(id, agent, depth).await {
            tracing::warn!(id = %id, agent = %agent, error = %e, "Failed to record memory access");
        }
    }

    /// Fallible body of `touch`
    async fn try_touch(&self, id: &str, agent: &str, depth: usize) -> SDKResult<()> {
        let store = &self.store;
        let cap = store.config().access_log_cap;
        let now = Utc::now();

        // The read and the update share one guard; other processes can still
        // interleave, which only affects the log.
        let db = self.db.write().await;
        let current = store.node(&db, id)?.access;

        let mut log = Vec::with_capacity(cap);
        log.push(AccessLogEntry {
            at: now,
            by: agent.to_string(),
            depth,
        });
        log.extend(current.access_log);
        log.truncate(cap);

        if !store.record_access(&db, id, &log, now)? {
            return Err(SDKError::not_found("MemoryNode", id));
        }
        tracing::trace!(id = %id, agent = %agent, depth, "Recorded memory access");
        Ok(())
    }

    /// Current telemetry of a node
    pub async fn access_stats(&self, id: &str) -> SDKResult<AccessStats> {
        self.read(|conn| Ok(self.store.node(conn, id)?.access)).await
    }
}
