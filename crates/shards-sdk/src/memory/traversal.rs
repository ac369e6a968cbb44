//! Tree traversal.
//!
//! Three read shapes:
//! - `tree` returns a flat, depth-annotated listing from one recursive query
//! - `expand` materializes real children down to a requested depth and
//!   records an access against every node it returns
//! - `path` returns the chain from the root down to a node
//!
//! All walks are bounded by the traversal depth cap so a cycle in the stored
//! data cannot run away.

use std::collections::HashSet;

use rusqlite::Connection;

use super::types::{ExpandedNode, MemoryNode, PathNode, TreeNode};
use super::{HierarchicalMemory, MemoryStore};
use crate::{SDKError, SDKResult};

impl HierarchicalMemory {
    /// Flat listing of the subtree under `root`, or of every tree in the
    /// project when `root` is `None`.
    ///
    /// `max_depth` is clamped to the traversal cap. Callers rebuild nesting
    /// by grouping on `parent_id`.
    pub async fn tree(&self, root: Option<&str>, max_depth: Option<usize>) -> SDKResult<Vec<TreeNode>> {
        let cap = self.config().traversal_depth_cap;
        let depth = max_depth.map_or(cap, |d| d.min(cap));

        self.read(|conn| {
            if let Some(root) = root {
                self.store.node(conn, root)?;
            }
            self.store.flat_tree(conn, root, depth)
        })
        .await
    }

    /// Expand a node and its real children down to `max_depth` levels.
    ///
    /// Nodes at `max_depth` are not expanded further and carry their own
    /// pointer entries instead. Every returned node is touched once, with
    /// its depth relative to `id`, after the read completes.
    pub async fn expand(&self, id: &str, max_depth: usize) -> SDKResult<ExpandedNode> {
        let limit = self.config().max_expand_depth;
        if max_depth > limit {
            return Err(SDKError::invalid_operation(format!(
                "expand depth {} exceeds the maximum of {}",
                max_depth, limit
            )));
        }

        let mut visited = Vec::new();
        let expanded = self
            .read(|conn| {
                let start = self.store.node(conn, id)?;
                let mut seen = HashSet::new();
                expand_node(&self.store, conn, start, 0, max_depth, &mut seen, &mut visited)
            })
            .await?;

        tracing::debug!(id = %id, max_depth, nodes = visited.len(), "Expanded memory");

        // Touches are dispatched after the read guard is released
        for (node_id, depth) in &visited {
            self.touch(node_id, &self.agent_id, *depth).await;
        }

        Ok(expanded)
    }

    /// Chain from the root down to `id`, root at depth 0.
    pub async fn path(&self, id: &str) -> SDKResult<Vec<PathNode>> {
        let (chain, reached_root) = self
            .read(|conn| {
                self.store.node(conn, id)?;
                self.store.ancestry(conn, id)
            })
            .await?;

        if !reached_root {
            return Err(SDKError::invalid_operation(format!(
                "ancestor chain of {} does not reach a root within {} levels",
                id,
                self.config().traversal_depth_cap
            )));
        }

        // The walk counts distance up from the target; invert it so the root
        // is 0 and the target is deepest.
        let max_distance = chain.iter().map(|link| link.distance).max().unwrap_or(0);
        let mut path: Vec<PathNode> = chain
            .into_iter()
            .map(|link| PathNode {
                id: link.id,
                title: link.title,
                depth: max_distance - link.distance,
            })
            .collect();
        path.sort_by_key(|node| node.depth);
        Ok(path)
    }
}

fn expand_node(
    store: &MemoryStore,
    conn: &Connection,
    node: MemoryNode,
    depth: usize,
    max_depth: usize,
    seen: &mut HashSet<String>,
    visited: &mut Vec<(String, usize)>,
) -> SDKResult<ExpandedNode> {
    seen.insert(node.id.clone());
    visited.push((node.id.clone(), depth));

    let mut out = ExpandedNode {
        id: node.id,
        title: node.title,
        status: node.status,
        body: node.body,
        depth,
        children: Vec::new(),
        pointers: Vec::new(),
        pointer_error: node.pointer_error,
        expanded: depth < max_depth,
    };

    if !out.expanded {
        out.pointers = node.pointers;
        return Ok(out);
    }

    for child in store.children(conn, &out.id, true)? {
        if seen.contains(&child.id) {
            tracing::warn!(parent = %out.id, child = %child.id, "Skipping node already expanded; tree contains a cycle");
            continue;
        }
        let expanded = expand_node(store, conn, child, depth + 1, max_depth, seen, visited)?;
        out.children.push(expanded);
    }
    Ok(out)
}
