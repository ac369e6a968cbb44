//! Sync reconciliation.
//!
//! Compares each parent's pointer block with its real (non-closed) children
//! and rewrites the block when they differ. Each parent is repaired in its
//! own transaction so one failure leaves the others unaffected.

use std::collections::HashSet;

use rusqlite::Connection;
use shards_core::db;

use super::pointer::{self, PointerEntry};
use super::types::{Discrepancy, DiscrepancyKind, SyncFailure, SyncReport, SyncTarget};
use super::{HierarchicalMemory, MemoryStore};
use crate::SDKResult;

/// Pointer block state of one parent compared with its real children
#[derive(Debug)]
struct ParentDiff {
    discrepancies: Vec<Discrepancy>,
    /// Entries the block should hold: kept entries in their current order,
    /// then placeholders for missing children
    desired: Vec<PointerEntry>,
    malformed: bool,
    duplicates: bool,
}

impl ParentDiff {
    fn needs_repair(&self) -> bool {
        !self.discrepancies.is_empty() || self.duplicates
    }
}

impl HierarchicalMemory {
    /// Reconcile pointer blocks with the tree.
    ///
    /// The report lists discrepancies as they were before any repair. With
    /// `dry_run` nothing is written.
    pub async fn sync(&self, target: SyncTarget, dry_run: bool) -> SDKResult<SyncReport> {
        let store = &self.store;
        let parents = self
            .read(|conn| match &target {
                SyncTarget::Parent(id) => {
                    store.node(conn, id)?;
                    Ok(vec![id.clone()])
                }
                SyncTarget::All => store.parent_candidates(conn),
            })
            .await?;

        let mut report = SyncReport {
            dry_run,
            ..Default::default()
        };

        for parent_id in parents {
            report.parents_checked += 1;

            let diff = match self.read(|conn| diff_parent(store, conn, &parent_id)).await {
                Ok(diff) => diff,
                Err(e) => {
                    tracing::warn!(parent = %parent_id, error = %e, "Failed to inspect pointer block");
                    report.failures.push(SyncFailure {
                        parent_id,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if diff.malformed {
                tracing::warn!(parent = %parent_id, "Pointer block is malformed");
                report.malformed.push(parent_id.clone());
            }
            let needs_repair = diff.needs_repair();
            report.discrepancies.extend(diff.discrepancies);

            if dry_run || !needs_repair {
                continue;
            }

            // Re-diff inside the transaction so the repair matches the state
            // it overwrites.
            let repaired = self
                .write("sync", |tx| {
                    let fresh = diff_parent(store, tx, &parent_id)?;
                    if !fresh.needs_repair() {
                        return Ok(false);
                    }
                    let content = store.content(tx, &parent_id)?;
                    let updated = pointer::replace_all(&content, &fresh.desired)?;
                    db::update_content(tx, &parent_id, &updated)?;
                    Ok(true)
                })
                .await;

            match repaired {
                Ok(true) => {
                    tracing::debug!(parent = %parent_id, "Rewrote pointer block");
                    report.repaired.push(parent_id);
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(parent = %parent_id, error = %e, "Failed to repair pointer block");
                    report.failures.push(SyncFailure {
                        parent_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            dry_run,
            parents = report.parents_checked,
            missing = report.count(DiscrepancyKind::MissingPointer),
            stale = report.count(DiscrepancyKind::StalePointer),
            repaired = report.repaired.len(),
            failures = report.failures.len(),
            "Memory sync complete"
        );
        Ok(report)
    }
}

fn diff_parent(store: &MemoryStore, conn: &Connection, parent_id: &str) -> SDKResult<ParentDiff> {
    let content = store.content(conn, parent_id)?;
    let (entries, malformed) = match pointer::parse(&content) {
        Ok(parsed) => (parsed.entries, false),
        Err(_) => (Vec::new(), true),
    };

    let children = store.children(conn, parent_id, false)?;
    let real: HashSet<&str> = children.iter().map(|c| c.id.as_str()).collect();

    let mut discrepancies = Vec::new();
    let mut desired = Vec::with_capacity(children.len());
    let mut listed = HashSet::new();
    let mut duplicates = false;

    for entry in entries {
        if !real.contains(entry.id.as_str()) {
            discrepancies.push(Discrepancy {
                parent_id: parent_id.to_string(),
                child_id: entry.id,
                title: entry.title,
                kind: DiscrepancyKind::StalePointer,
            });
        } else if listed.insert(entry.id.clone()) {
            desired.push(entry);
        } else {
            duplicates = true;
        }
    }

    for child in &children {
        if listed.contains(&child.id) {
            continue;
        }
        discrepancies.push(Discrepancy {
            parent_id: parent_id.to_string(),
            child_id: child.id.clone(),
            title: child.title.clone(),
            kind: DiscrepancyKind::MissingPointer,
        });
        desired.push(PointerEntry::new(
            &child.id,
            &child.title,
            &store.config().placeholder_summary,
        ));
    }

    Ok(ParentDiff {
        discrepancies,
        desired,
        malformed,
        duplicates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::memory::{MoveTarget, NewRootMemory, NewSubMemory};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn setup_test_memory() -> HierarchicalMemory {
        let conn = shards_core::db::open_in_memory().unwrap();
        let db = Arc::new(RwLock::new(conn));
        HierarchicalMemory::new(db, "test-project".into(), "tester".into(), MemoryConfig::default())
    }

    async fn root(memory: &HierarchicalMemory, title: &str) -> String {
        memory
            .create_root(NewRootMemory {
                title: title.into(),
                body: format!("{} notes", title),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    async fn sub(memory: &HierarchicalMemory, parent: &str, title: &str) -> String {
        memory
            .create_sub_memory(NewSubMemory {
                parent_id: parent.into(),
                title: title.into(),
                summary: format!("about {}", title),
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    async fn raw_content(memory: &HierarchicalMemory, id: &str) -> String {
        memory.read(|conn| memory.store.content(conn, id)).await.unwrap()
    }

    async fn set_raw_content(memory: &HierarchicalMemory, id: &str, content: &str) {
        let db = memory.db.write().await;
        db::update_content(&db, id, content).unwrap();
    }

    /// Parent P with one real child missing from its block and one stale
    /// entry for a child that no longer exists.
    async fn drifted_parent(memory: &HierarchicalMemory) -> (String, String, String) {
        let p = root(memory, "P").await;
        sub(memory, &p, "Kept").await;

        let content = raw_content(memory, &p).await;
        let content = pointer::append(&content, PointerEntry::new("gone", "Gone", "old")).unwrap();
        set_raw_content(memory, &p, &content).await;

        let missing = {
            let db = memory.db.write().await;
            memory
                .store
                .insert(&db, "Missing", "", Some(&p), &[], None, None)
                .unwrap()
        };
        (p, missing, "gone".to_string())
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_writing() {
        let memory = setup_test_memory();
        let (p, missing, stale) = drifted_parent(&memory).await;
        let before = raw_content(&memory, &p).await;

        let report = memory.sync(SyncTarget::Parent(p.clone()), true).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.parents_checked, 1);
        assert_eq!(report.count(DiscrepancyKind::MissingPointer), 1);
        assert_eq!(report.count(DiscrepancyKind::StalePointer), 1);
        assert!(report.repaired.is_empty());

        let ids: HashSet<_> = report.for_parent(&p).map(|d| d.child_id.clone()).collect();
        assert_eq!(ids, HashSet::from([missing, stale]));

        assert_eq!(raw_content(&memory, &p).await, before);
    }

    #[tokio::test]
    async fn test_repair_converges() {
        let memory = setup_test_memory();
        let (p, missing, _) = drifted_parent(&memory).await;

        let report = memory.sync(SyncTarget::Parent(p.clone()), false).await.unwrap();
        assert_eq!(report.discrepancies.len(), 2);
        assert_eq!(report.repaired, vec![p.clone()]);

        let node = memory.get(&p).await.unwrap();
        assert_eq!(node.body, "P notes");
        let titles: Vec<_> = node.pointers.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Kept", "Missing"]);
        let placeholder = node.pointers.iter().find(|e| e.id == missing).unwrap();
        assert_eq!(placeholder.summary, "");
        assert_eq!(node.pointers[0].summary, "about Kept");

        let again = memory.sync(SyncTarget::Parent(p), false).await.unwrap();
        assert!(again.is_clean());
        assert!(again.repaired.is_empty());
    }

    #[tokio::test]
    async fn test_repairs_malformed_block() {
        let memory = setup_test_memory();
        let p = root(&memory, "P").await;
        let child = sub(&memory, &p, "Child").await;
        set_raw_content(&memory, &p, &format!("P notes\n\n{}\n[broken", pointer::POINTER_START)).await;

        let report = memory.sync(SyncTarget::All, false).await.unwrap();
        assert_eq!(report.malformed, vec![p.clone()]);
        assert_eq!(report.count(DiscrepancyKind::MissingPointer), 1);

        let node = memory.get(&p).await.unwrap();
        assert!(node.pointer_error.is_none());
        assert_eq!(node.pointers.len(), 1);
        assert_eq!(node.pointers[0].id, child);

        assert!(memory.sync(SyncTarget::All, false).await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn test_closed_children_are_stale() {
        let memory = setup_test_memory();
        let p = root(&memory, "P").await;
        let child = sub(&memory, &p, "Child").await;
        {
            let db = memory.db.write().await;
            db::set_status(&db, &child, shards_core::ShardStatus::Closed).unwrap();
        }

        let report = memory.sync(SyncTarget::All, false).await.unwrap();
        assert_eq!(report.count(DiscrepancyKind::StalePointer), 1);
        assert!(memory.get(&p).await.unwrap().pointers.is_empty());
        assert_eq!(raw_content(&memory, &p).await, "P notes");
    }

    #[tokio::test]
    async fn test_sync_all_after_clean_moves() {
        let memory = setup_test_memory();
        let a = root(&memory, "A").await;
        let b = root(&memory, "B").await;
        let c = sub(&memory, &a, "C").await;
        memory.move_to(&c, MoveTarget::Parent(b.clone())).await.unwrap();

        let report = memory.sync(SyncTarget::All, true).await.unwrap();
        assert_eq!(report.parents_checked, 1);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_sync_missing_parent() {
        let memory = setup_test_memory();
        let err = memory.sync(SyncTarget::Parent("missing".into()), true).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
