//! Sub-memory mutations.
//!
//! Each operation writes the authoritative tree (the child's parent ID) and
//! the parent's pointer block inside the same transaction. Either both
//! changes become visible or neither does.

use rusqlite::Connection;
use shards_core::{db, ShardType};

use super::pointer::{self, PointerEntry};
use super::types::*;
use super::{HierarchicalMemory, MemoryStore};
use crate::{SDKError, SDKResult};

impl HierarchicalMemory {
    /// Create a parentless memory
    pub async fn create_root(&self, input: NewRootMemory) -> SDKResult<String> {
        let store = &self.store;
        let id = self
            .write("create_root", |tx| {
                store.insert(
                    tx,
                    &input.title,
                    &input.body,
                    None,
                    &input.labels,
                    None,
                    input.embedding.as_deref(),
                )
            })
            .await?;

        tracing::info!(id = %id, title = %input.title, "Created root memory");
        Ok(id)
    }

    /// Create a memory under an existing parent and record it in the
    /// parent's pointer block.
    ///
    /// Fails with `DepthExceeded` when the new node would sit at or below
    /// the soft depth limit and `force` is not set.
    pub async fn create_sub_memory(&self, input: NewSubMemory) -> SDKResult<CreateResult> {
        let store = &self.store;
        let limit = store.config().soft_depth_limit;

        let result = self
            .write("create_sub_memory", |tx| {
                let parent = store.node(tx, &input.parent_id)?;
                let depth = store.depth(tx, &parent.id)? + 1;
                if depth >= limit && !input.force {
                    return Err(SDKError::DepthExceeded { depth, limit });
                }

                let id = store.insert(
                    tx,
                    &input.title,
                    &input.body,
                    Some(&parent.id),
                    &input.labels,
                    Some(&input.summary),
                    input.embedding.as_deref(),
                )?;
                tracing::debug!(id = %id, parent = %parent.id, depth, "Inserted sub-memory");

                attach_pointer(
                    store,
                    tx,
                    &parent.id,
                    PointerEntry::new(&id, &input.title, &input.summary),
                )?;

                Ok(CreateResult {
                    id,
                    summary: input.summary.clone(),
                    depth,
                })
            })
            .await?;

        tracing::info!(
            id = %result.id,
            parent = %input.parent_id,
            depth = result.depth,
            "Created sub-memory"
        );
        Ok(result)
    }

    /// Delete a node.
    ///
    /// With `recursive`, the whole subtree goes in one transaction, innermost
    /// nodes first. Without it, children are handled by `orphans`. In both
    /// cases the node's entry is removed from its parent's pointer block.
    pub async fn delete(&self, id: &str, options: DeleteOptions) -> SDKResult<DeleteResult> {
        let store = &self.store;
        let cap = store.config().traversal_depth_cap;

        let result = self
            .write("delete", |tx| {
                let node = store.node(tx, id)?;
                let mut result = DeleteResult::default();

                if options.recursive {
                    let mut subtree = db::descendants(tx, id, cap, Some(ShardType::Memory))?;
                    for link in subtree.iter().filter(|l| l.distance == cap) {
                        if !store.children(tx, &link.id, true)?.is_empty() {
                            return Err(SDKError::invalid_operation(format!(
                                "subtree of {} is deeper than {} levels or contains a cycle",
                                id, cap
                            )));
                        }
                    }

                    subtree.sort_by(|a, b| b.distance.cmp(&a.distance));
                    for link in subtree {
                        db::delete_shard(tx, &link.id)?;
                        result.deleted.push(link.id);
                    }
                } else {
                    let children = store.children(tx, id, true)?;
                    if !children.is_empty() {
                        match options.orphans {
                            OrphanPolicy::Reject => {
                                return Err(SDKError::invalid_operation(format!(
                                    "{} has {} children; delete recursively or detach them",
                                    id,
                                    children.len()
                                )));
                            }
                            OrphanPolicy::Detach => {
                                for child in children {
                                    db::set_parent(tx, &child.id, None)?;
                                    result.detached.push(child.id);
                                }
                            }
                        }
                    }
                    db::delete_shard(tx, id)?;
                    result.deleted.push(id.to_string());
                }

                if let Some(parent_id) = node.parent_id.as_deref() {
                    if detach_pointer(store, tx, parent_id, id)?.is_some() {
                        result.removed_from_parent = Some(parent_id.to_string());
                    }
                }

                Ok(result)
            })
            .await?;

        tracing::info!(
            id = %id,
            deleted = result.deleted.len(),
            detached = result.detached.len(),
            "Deleted memory"
        );
        Ok(result)
    }

    /// Re-parent a node under another node or make it a root
    pub async fn move_to(&self, id: &str, target: MoveTarget) -> SDKResult<MoveResult> {
        let store = &self.store;
        let result = self
            .write("move", |tx| reparent(store, tx, id, target.parent_id()))
            .await?;

        tracing::info!(
            id = %id,
            old_parent = ?result.old_parent,
            new_parent = ?result.new_parent,
            "Moved memory"
        );
        Ok(result)
    }

    /// Move a node to its grandparent, or to the root level when its parent
    /// is a root
    pub async fn promote(&self, id: &str) -> SDKResult<PromoteResult> {
        let store = &self.store;
        let result = self
            .write("promote", |tx| {
                let node = store.node(tx, id)?;
                let parent_id = node.parent_id.ok_or_else(|| {
                    SDKError::invalid_operation(format!("{} is already a root", id))
                })?;
                let grandparent = match db::get_shard(tx, &parent_id)? {
                    Some(parent) => parent.parent_id,
                    None => None,
                };

                let moved = reparent(store, tx, id, grandparent.as_deref())?;
                let new_depth = store.depth(tx, id)?;
                Ok(PromoteResult {
                    id: moved.id,
                    old_parent: moved.old_parent,
                    new_parent: moved.new_parent,
                    new_depth,
                })
            })
            .await?;

        tracing::info!(id = %id, new_depth = result.new_depth, "Promoted memory");
        Ok(result)
    }
}

/// Shared body of move and promote; runs inside the caller's transaction.
///
/// The ancestor check reads the chain in the same IMMEDIATE transaction that
/// writes the new parent, which serializes it against other writers on this
/// database. Stores without that locking can still race; `audit_cycles`
/// detects any loop that slips through.
fn reparent(
    store: &MemoryStore,
    conn: &Connection,
    id: &str,
    new_parent_id: Option<&str>,
) -> SDKResult<MoveResult> {
    let node = store.node(conn, id)?;

    if let Some(parent_id) = new_parent_id {
        if parent_id == id {
            return Err(SDKError::cycle_rejected(id, parent_id, "a node cannot be its own parent"));
        }
        store.node(conn, parent_id)?;

        let (chain, reached_root) = store.ancestry(conn, parent_id)?;
        if chain.iter().any(|link| link.id == id) {
            return Err(SDKError::cycle_rejected(
                id,
                parent_id,
                format!("{} is a descendant of {}", parent_id, id),
            ));
        }
        if !reached_root {
            return Err(SDKError::cycle_rejected(
                id,
                parent_id,
                "ancestry of the new parent does not reach a root within the depth cap",
            ));
        }
    }

    let old_parent = node.parent_id.clone();
    if old_parent.as_deref() == new_parent_id {
        return Ok(MoveResult {
            id: id.to_string(),
            old_parent: old_parent.clone(),
            new_parent: old_parent,
        });
    }

    db::set_parent(conn, id, new_parent_id)?;

    let mut summary = node.summary.clone().unwrap_or_default();
    if let Some(old) = old_parent.as_deref() {
        if let Some(entry) = detach_pointer(store, conn, old, id)? {
            summary = entry.summary;
        }
    }

    if let Some(new) = new_parent_id {
        let entry = PointerEntry::new(id, &node.title, &summary);
        match attach_pointer(store, conn, new, entry) {
            Err(e) if e.is_malformed_block() => {
                tracing::warn!(parent = %new, child = %id, error = %e, "Leaving malformed pointer block for sync");
            }
            other => other?,
        }
        store.set_summary(conn, id, &summary)?;
    }

    Ok(MoveResult {
        id: id.to_string(),
        old_parent,
        new_parent: new_parent_id.map(String::from),
    })
}

/// Append an entry to a parent's pointer block
fn attach_pointer(store: &MemoryStore, conn: &Connection, parent_id: &str, entry: PointerEntry) -> SDKResult<()> {
    let content = store.content(conn, parent_id)?;
    let updated = pointer::append(&content, entry)?;
    db::update_content(conn, parent_id, &updated)?;
    Ok(())
}

/// Remove a child's entry from a parent's pointer block, returning the
/// removed entry. A parent that no longer exists, never listed the child or
/// carries a malformed block is left alone; sync repairs the latter.
fn detach_pointer(
    store: &MemoryStore,
    conn: &Connection,
    parent_id: &str,
    child_id: &str,
) -> SDKResult<Option<PointerEntry>> {
    let content = match store.content(conn, parent_id) {
        Ok(content) => content,
        Err(SDKError::NotFound { .. }) => return Ok(None),
        Err(e) => return Err(e),
    };

    let parsed = match pointer::parse(&content) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(parent = %parent_id, child = %child_id, error = %e, "Leaving malformed pointer block for sync");
            return Ok(None);
        }
    };
    let Some(entry) = parsed.entries.iter().find(|e| e.id == child_id).cloned() else {
        return Ok(None);
    };

    let remaining: Vec<PointerEntry> = parsed
        .entries
        .into_iter()
        .filter(|e| e.id != child_id)
        .collect();
    db::update_content(conn, parent_id, &pointer::render(&parsed.main, &remaining)?)?;
    Ok(Some(entry))
}
