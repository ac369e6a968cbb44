//! Promotion heuristic.
//!
//! A node read more often than its parent is a hint that it belongs higher
//! in the tree. Nothing here mutates; restructuring is left to `move_to` and
//! `promote`.

use std::collections::HashMap;

use super::types::HotCandidate;
use super::HierarchicalMemory;
use crate::SDKResult;

impl HierarchicalMemory {
    /// Nodes at `min_depth` or deeper whose access count strictly exceeds
    /// their parent's, most accessed first.
    pub async fn hot(&self, min_depth: usize, limit: usize) -> SDKResult<Vec<HotCandidate>> {
        let cap = self.config().traversal_depth_cap;
        let nodes = self.read(|conn| self.store.flat_tree(conn, None, cap)).await?;

        let counts: HashMap<&str, u64> = nodes
            .iter()
            .map(|n| (n.id.as_str(), n.access_count))
            .collect();

        let mut candidates: Vec<HotCandidate> = nodes
            .iter()
            .filter(|n| n.depth >= min_depth)
            .filter_map(|n| {
                let parent_id = n.parent_id.as_deref()?;
                let parent_access_count = *counts.get(parent_id)?;
                (n.access_count > parent_access_count).then(|| HotCandidate {
                    id: n.id.clone(),
                    title: n.title.clone(),
                    parent_id: parent_id.to_string(),
                    depth: n.depth,
                    access_count: n.access_count,
                    parent_access_count,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.access_count
                .cmp(&a.access_count)
                .then(b.depth.cmp(&a.depth))
                .then(a.id.cmp(&b.id))
        });
        candidates.truncate(limit);

        tracing::debug!(min_depth, limit, found = candidates.len(), "Computed promotion candidates");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::memory::{NewRootMemory, NewSubMemory};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn setup_test_memory() -> HierarchicalMemory {
        let conn = shards_core::db::open_in_memory().unwrap();
        let db = Arc::new(RwLock::new(conn));
        HierarchicalMemory::new(db, "test-project".into(), "tester".into(), MemoryConfig::default())
    }

    async fn sub(memory: &HierarchicalMemory, parent: &str, title: &str) -> String {
        memory
            .create_sub_memory(NewSubMemory {
                parent_id: parent.into(),
                title: title.into(),
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    async fn touch_n(memory: &HierarchicalMemory, id: &str, n: usize) {
        for _ in 0..n {
            memory.touch(id, "tester", 0).await;
        }
    }

    #[tokio::test]
    async fn test_hot_candidates() {
        let memory = setup_test_memory();
        let root = memory.create_root(NewRootMemory::default()).await.unwrap();
        let busy = sub(&memory, &root, "Busy").await;
        let quiet = sub(&memory, &root, "Quiet").await;
        let deep = sub(&memory, &busy, "Deep").await;
        let equal = sub(&memory, &quiet, "Equal").await;

        touch_n(&memory, &root, 2).await;
        touch_n(&memory, &busy, 3).await;
        touch_n(&memory, &quiet, 1).await;
        touch_n(&memory, &deep, 5).await;
        touch_n(&memory, &equal, 1).await;

        let hot = memory.hot(1, 10).await.unwrap();
        let ids: Vec<_> = hot.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![deep.clone(), busy.clone()]);
        assert_eq!(hot[0].parent_access_count, 3);
        assert_eq!(hot[0].depth, 2);

        let deeper_only = memory.hot(2, 10).await.unwrap();
        assert_eq!(deeper_only.len(), 1);
        assert_eq!(deeper_only[0].id, deep);

        let limited = memory.hot(1, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, deep);
    }

    #[tokio::test]
    async fn test_hot_empty_project() {
        let memory = setup_test_memory();
        assert!(memory.hot(0, 10).await.unwrap().is_empty());
    }
}
