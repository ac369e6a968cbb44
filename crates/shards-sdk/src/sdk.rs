//! Main SDK Entry Point
//!
//! Opens the shard store and hands out the hierarchical memory system.

use std::sync::Arc;
use rusqlite::Connection;
use tokio::sync::RwLock;

use crate::{SDKConfig, SDKResult};

#[cfg(feature = "memory")]
use crate::memory::HierarchicalMemory;

/// Shards SDK - Main entry point
///
/// # Example
///
/// ```rust,no_run
/// use shards_sdk::{SDK, SDKConfig};
/// use shards_sdk::memory::{NewRootMemory, NewSubMemory};
///
/// async fn example() -> anyhow::Result<()> {
///     let sdk = SDK::new(SDKConfig::new("shards.db", "my-project"))?;
///
///     let root = sdk.memory().create_root(NewRootMemory {
///         title: "Architecture".into(),
///         ..Default::default()
///     }).await?;
///
///     sdk.memory().create_sub_memory(NewSubMemory {
///         parent_id: root.clone(),
///         title: "Storage".into(),
///         body: "SQLite with WAL".into(),
///         summary: "Storage engine notes".into(),
///         ..Default::default()
///     }).await?;
///
///     let tree = sdk.memory().expand(&root, 2).await?;
///     println!("{} nodes", tree.count());
///     Ok(())
/// }
/// ```
pub struct SDK {
    /// SDK configuration
    config: SDKConfig,

    /// Database connection
    db: Arc<RwLock<Connection>>,

    /// Hierarchical memory system
    #[cfg(feature = "memory")]
    memory: HierarchicalMemory,
}

impl SDK {
    /// Create a new SDK instance
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The database cannot be opened or migrated
    pub fn new(config: SDKConfig) -> SDKResult<Self> {
        config.validate()?;

        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Opens with WAL and runs the schema migration
        let conn = shards_core::db::open(&config.database_path)?;

        Ok(Self::with_connection(config, conn))
    }

    /// Create an SDK from `SDKConfig::load()`
    pub fn from_env() -> SDKResult<Self> {
        Self::new(SDKConfig::load()?)
    }

    /// Wrap an already open and migrated connection
    pub fn with_connection(config: SDKConfig, conn: Connection) -> Self {
        let db = Arc::new(RwLock::new(conn));

        #[cfg(feature = "memory")]
        let memory = HierarchicalMemory::new(
            db.clone(),
            config.project.clone(),
            config.agent_id.clone(),
            config.memory.clone(),
        );

        Self {
            config,
            db,
            #[cfg(feature = "memory")]
            memory,
        }
    }

    /// Get the SDK configuration
    pub fn config(&self) -> &SDKConfig {
        &self.config
    }

    /// Shared database handle, for collaborators that manage other shard types
    pub fn db(&self) -> Arc<RwLock<Connection>> {
        self.db.clone()
    }

    /// Get the hierarchical memory system
    #[cfg(feature = "memory")]
    pub fn memory(&self) -> &HierarchicalMemory {
        &self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::NewRootMemory;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_sdk_creation() {
        let temp_db = NamedTempFile::new().unwrap();
        let config = SDKConfig::new(temp_db.path(), "test-project").with_agent("test-agent");

        let sdk = SDK::new(config).unwrap();
        assert_eq!(sdk.config().project, "test-project");
        assert_eq!(sdk.memory().agent_id(), "test-agent");
        assert_eq!(sdk.memory().project(), "test-project");
    }

    #[tokio::test]
    async fn test_sdk_validation() {
        let config = SDKConfig::default(); // Missing project
        let sdk = SDK::new(config);
        assert!(sdk.is_err());
    }

    #[tokio::test]
    async fn test_data_persists_across_instances() {
        let temp_db = NamedTempFile::new().unwrap();
        let config = SDKConfig::new(temp_db.path(), "test-project");

        let id = {
            let sdk = SDK::new(config.clone()).unwrap();
            sdk.memory()
                .create_root(NewRootMemory {
                    title: "Persistent".into(),
                    ..Default::default()
                })
                .await
                .unwrap()
        };

        let sdk = SDK::new(config).unwrap();
        assert_eq!(sdk.memory().get(&id).await.unwrap().title, "Persistent");
    }

    #[tokio::test]
    async fn test_projects_are_isolated() {
        let temp_db = NamedTempFile::new().unwrap();
        let a = SDK::new(SDKConfig::new(temp_db.path(), "project-a")).unwrap();
        let id = a.memory().create_root(NewRootMemory::default()).await.unwrap();

        let b = SDK::new(SDKConfig::new(temp_db.path(), "project-b")).unwrap();
        assert!(b.memory().get(&id).await.unwrap_err().is_not_found());
        assert!(b.memory().tree(None, None).await.unwrap().is_empty());
    }
}
