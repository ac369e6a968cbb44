//! Memory Store Implementation
//!
//! SQLite queries specific to memory nodes. Every method takes the
//! connection explicitly so it can run on a read guard or inside a write
//! transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use shards_core::{db, ShardLink, ShardStatus, ShardType};

use super::types::*;
use crate::config::MemoryConfig;
use crate::{SDKError, SDKResult};

/// Memory queries scoped to one project
pub struct MemoryStore {
    project: String,
    config: MemoryConfig,
}

impl MemoryStore {
    /// Create a new memory store
    pub fn new(project: String, config: MemoryConfig) -> Self {
        Self { project, config }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Load a memory node, failing with NotFound or WrongType
    pub fn node(&self, conn: &Connection, id: &str) -> SDKResult<MemoryNode> {
        let shard = db::get_shard(conn, id)?
            .filter(|s| s.project == self.project)
            .ok_or_else(|| SDKError::not_found("MemoryNode", id))?;
        MemoryNode::from_shard(shard)
    }

    /// Raw content of a memory node
    pub fn content(&self, conn: &Connection, id: &str) -> SDKResult<String> {
        let shard = db::get_shard(conn, id)?
            .filter(|s| s.project == self.project)
            .ok_or_else(|| SDKError::not_found("MemoryNode", id))?;
        if shard.shard_type != ShardType::Memory {
            return Err(SDKError::wrong_type(id, "memory", shard.shard_type.as_str()));
        }
        Ok(shard.content)
    }

    /// Real children of a node, oldest first
    pub fn children(&self, conn: &Connection, id: &str, include_closed: bool) -> SDKResult<Vec<MemoryNode>> {
        db::children(conn, id, Some(ShardType::Memory))?
            .into_iter()
            .filter(|s| include_closed || s.status != ShardStatus::Closed)
            .map(MemoryNode::from_shard)
            .collect()
    }

    /// Ancestor chain from `id` upward, bounded by the traversal cap.
    ///
    /// Returns the chain and whether it ended at a root. A chain that did
    /// not reach a root either loops or is deeper than the cap.
    pub fn ancestry(&self, conn: &Connection, id: &str) -> SDKResult<(Vec<ShardLink>, bool)> {
        let chain = db::ancestors(conn, id, self.config.traversal_depth_cap)?;
        if chain.is_empty() {
            return Err(SDKError::not_found("MemoryNode", id));
        }
        let reached_root = chain.last().is_some_and(|link| link.parent_id.is_none());
        Ok((chain, reached_root))
    }

    /// Depth of a node (root = 0), computed by walking to the root
    pub fn depth(&self, conn: &Connection, id: &str) -> SDKResult<usize> {
        let (chain, reached_root) = self.ancestry(conn, id)?;
        if !reached_root {
            return Err(SDKError::invalid_operation(format!(
                "ancestor chain of {} does not reach a root within {} levels",
                id, self.config.traversal_depth_cap
            )));
        }
        Ok(chain.len() - 1)
    }

    /// Insert a memory shard and return its ID
    pub fn insert(
        &self,
        conn: &Connection,
        title: &str,
        body: &str,
        parent_id: Option<&str>,
        labels: &[String],
        summary: Option<&str>,
        embedding: Option<&[f32]>,
    ) -> SDKResult<String> {
        let mut metadata = serde_json::Map::new();
        metadata.insert(ACCESS_COUNT_KEY.into(), 0.into());
        metadata.insert(ACCESS_LOG_KEY.into(), serde_json::Value::Array(Vec::new()));
        if let Some(summary) = summary {
            metadata.insert(SUMMARY_KEY.into(), summary.into());
        }

        let shard = shards_core::NewShard {
            project: self.project.clone(),
            shard_type: ShardType::Memory,
            title: title.to_string(),
            content: body.to_string(),
            parent_id: parent_id.map(String::from),
            labels: labels.to_vec(),
            metadata,
            embedding: embedding.map(<[f32]>::to_vec),
        };
        Ok(db::insert_shard(conn, &shard)?)
    }

    /// Remember the summary a node was last attached with
    pub fn set_summary(&self, conn: &Connection, id: &str, summary: &str) -> SDKResult<()> {
        conn.execute(
            "UPDATE shards SET metadata_json = json_set(metadata_json, '$.summary', ?1) WHERE id = ?2",
            params![summary, id],
        )?;
        Ok(())
    }

    /// Flat listing of every node under `root` (or under every root of the
    /// project), shallowest first.
    pub fn flat_tree(&self, conn: &Connection, root: Option<&str>, max_depth: usize) -> SDKResult<Vec<TreeNode>> {
        let mut stmt = conn.prepare(
            "WITH RECURSIVE tree(id, depth) AS (
                 SELECT id, 0 FROM shards
                 WHERE project = ?1 AND shard_type = 'memory'
                   AND ((?2 IS NULL AND parent_id IS NULL) OR id = ?2)
                 UNION ALL
                 SELECT s.id, t.depth + 1
                 FROM shards s JOIN tree t ON s.parent_id = t.id
                 WHERE t.depth < ?3 AND s.shard_type = 'memory'
             )
             SELECT s.id, s.title, s.status, s.parent_id, t.depth,
                    COALESCE(json_extract(s.metadata_json, '$.access_count'), 0),
                    json_extract(s.metadata_json, '$.last_accessed'),
                    (SELECT COUNT(*) FROM shards c
                     WHERE c.parent_id = s.id AND c.shard_type = 'memory')
             FROM tree t JOIN shards s ON s.id = t.id
             ORDER BY t.depth, s.created_at, s.rowid",
        )?;

        let rows = stmt.query_map(params![self.project, root, max_depth as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?;

        let mut nodes = Vec::new();
        for row in rows {
            let (id, title, status, parent_id, depth, access_count, last_accessed, child_count) = row?;
            nodes.push(TreeNode {
                id,
                title,
                status: status.parse::<ShardStatus>().map_err(SDKError::invalid_operation)?,
                parent_id,
                depth: depth as usize,
                access_count: access_count.max(0) as u64,
                last_accessed: last_accessed
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc)),
                child_count: child_count as usize,
            });
        }
        Ok(nodes)
    }

    /// IDs of memory nodes that either have real children or carry a pointer
    /// block. These are the parents a full sync inspects.
    pub fn parent_candidates(&self, conn: &Connection) -> SDKResult<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT p.id FROM shards p
             WHERE p.project = ?1 AND p.shard_type = 'memory'
               AND (instr(p.content, ?2) > 0
                    OR EXISTS (SELECT 1 FROM shards c
                               WHERE c.parent_id = p.id AND c.shard_type = 'memory'))
             ORDER BY p.created_at, p.rowid",
        )?;
        let ids = stmt
            .query_map(params![self.project, super::pointer::POINTER_START], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Every memory node ID in the project
    pub fn all_ids(&self, conn: &Connection) -> SDKResult<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT id FROM shards WHERE project = ?1 AND shard_type = 'memory' ORDER BY created_at, rowid",
        )?;
        let ids = stmt
            .query_map(params![self.project], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Record one access in a single UPDATE.
    ///
    /// The counter is incremented by the statement itself, so concurrent
    /// touches never lose a count. The log is computed from the snapshot the
    /// caller read and may drop an interleaved entry under contention.
    pub fn record_access(&self, conn: &Connection, id: &str, log: &[AccessLogEntry], at: DateTime<Utc>) -> SDKResult<bool> {
        let log_json = serde_json::to_string(log)?;
        let changed = conn.execute(
            "UPDATE shards SET metadata_json = json_set(
                 metadata_json,
                 '$.access_count', COALESCE(json_extract(metadata_json, '$.access_count'), 0) + 1,
                 '$.last_accessed', ?1,
                 '$.access_log', json(?2))
             WHERE id = ?3 AND project = ?4 AND shard_type = 'memory'",
            params![at.to_rfc3339(), log_json, id, self.project],
        )?;
        Ok(changed > 0)
    }
}
