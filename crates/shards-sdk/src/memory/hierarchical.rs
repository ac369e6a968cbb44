//! Hierarchical Memory System
//!
//! High-level interface over the memory store. Nodes form a forest through
//! their parent ID; each parent also caches a summary of its children in an
//! embedded pointer block. Operations are split by concern:
//!
//! - `mutation` - create, delete, move and promote (tree + pointer block in
//!   one transaction)
//! - `traversal` - flat tree, expanding reads and root paths
//! - `telemetry` - access recording
//! - `promotion` - restructuring candidates
//! - `sync` - drift reconciliation
//! - `audit` - after-the-fact cycle detection

use std::sync::Arc;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tokio::sync::RwLock;

use super::{MemoryNode, MemoryStore};
use crate::{SDKResult, config::MemoryConfig};

/// High-level hierarchical memory interface
pub struct HierarchicalMemory {
    pub(super) db: Arc<RwLock<Connection>>,
    pub(super) store: MemoryStore,
    pub(super) agent_id: String,
}

impl HierarchicalMemory {
    /// Create a new hierarchical memory system
    pub fn new(
        db: Arc<RwLock<Connection>>,
        project: String,
        agent_id: String,
        config: MemoryConfig,
    ) -> Self {
        Self {
            db,
            store: MemoryStore::new(project, config),
            agent_id,
        }
    }

    /// Project every operation is scoped to
    pub fn project(&self) -> &str {
        self.store.project()
    }

    /// Agent recorded by reads that touch nodes
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn config(&self) -> &MemoryConfig {
        self.store.config()
    }

    /// Load a single node
    pub async fn get(&self, id: &str) -> SDKResult<MemoryNode> {
        self.read(|conn| self.store.node(conn, id)).await
    }

    /// Run read-only queries against a shared connection guard
    pub(super) async fn read<F, R>(&self, f: F) -> SDKResult<R>
    where
        F: FnOnce(&Connection) -> SDKResult<R>,
    {
        let db = self.db.read().await;
        f(&db)
    }

    /// Run a mutation inside one IMMEDIATE transaction.
    ///
    /// The write lock is taken when the transaction begins, so checks made at
    /// the start of `f` see the state the writes apply to. Any error drops the
    /// transaction, which rolls it back.
    pub(super) async fn write<F, R>(&self, op: &'static str, f: F) -> SDKResult<R>
    where
        F: FnOnce(&Transaction<'_>) -> SDKResult<R>,
    {
        let mut db = self.db.write().await;
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;

        match f(&tx) {
            Ok(out) => {
                tx.commit()?;
                Ok(out)
            }
            Err(e) => {
                tracing::debug!(op, error = %e, "Rolling back memory transaction");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::NewRootMemory;

    fn setup_test_memory() -> HierarchicalMemory {
        let conn = shards_core::db::open_in_memory().unwrap();
        let db = Arc::new(RwLock::new(conn));
        HierarchicalMemory::new(db, "test-project".into(), "tester".into(), MemoryConfig::default())
    }

    #[tokio::test]
    async fn test_get_missing() {
        let memory = setup_test_memory();
        let err = memory.get("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back() {
        let memory = setup_test_memory();
        let root = memory
            .create_root(NewRootMemory {
                title: "Root".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let result: SDKResult<()> = memory
            .write("test", |tx| {
                shards_core::db::update_content(tx, &root, "changed")?;
                Err(crate::SDKError::invalid_operation("abort"))
            })
            .await;
        assert!(result.is_err());

        let node = memory.get(&root).await.unwrap();
        assert_eq!(node.body, "");
    }
}
