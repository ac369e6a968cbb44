//! SDK Configuration
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (SHARDS_*)
//! 2. Config file (SHARDS_CONFIG or ~/.shards/config.toml)
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{SDKError, SDKResult};

/// SDK configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SDKConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Project that scopes every tree walk
    pub project: String,

    /// Agent identity recorded in access telemetry
    pub agent_id: String,

    /// Hierarchical memory configuration
    pub memory: MemoryConfig,
}

impl Default for SDKConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(shards_core::db::DATABASE_FILE),
            project: String::new(),
            agent_id: "agent".to_string(),
            memory: MemoryConfig::default(),
        }
    }
}

/// Hierarchical memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Hard depth bound for every tree walk (default: 20)
    pub traversal_depth_cap: usize,

    /// Depth at which creating a sub-memory needs an explicit bypass (default: 5)
    pub soft_depth_limit: usize,

    /// Largest depth accepted by expanding reads (default: 5)
    pub max_expand_depth: usize,

    /// Number of access log entries retained per node (default: 50)
    pub access_log_cap: usize,

    /// Summary text written for pointers restored by sync (default: empty)
    pub placeholder_summary: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            traversal_depth_cap: 20,
            soft_depth_limit: 5,
            max_expand_depth: 5,
            access_log_cap: 50,
            placeholder_summary: String::new(),
        }
    }
}

impl SDKConfig {
    /// Create a new SDK config with the given database path and project
    pub fn new(database_path: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            project: project.into(),
            ..Default::default()
        }
    }

    /// Load configuration from file and environment.
    pub fn load() -> SDKResult<Self> {
        let config_path = Self::config_path();
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content).map_err(|e| {
                SDKError::Other(anyhow::anyhow!(
                    "failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })?
        } else {
            SDKConfig::default()
        };

        if let Ok(path) = std::env::var("SHARDS_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        } else if !config_path.exists() {
            config.database_path = shards_core::db::find_database()?;
        }
        if let Ok(project) = std::env::var("SHARDS_PROJECT") {
            config.project = project;
        }
        if let Ok(agent) = std::env::var("SHARDS_AGENT") {
            config.agent_id = agent;
        }

        Ok(config)
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("SHARDS_CONFIG") {
            PathBuf::from(path)
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".shards")
                .join("config.toml")
        }
    }

    /// Set the agent identity
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    /// Set the project
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Set memory configuration
    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.project.is_empty() {
            return Err(ConfigValidationError::MissingProject);
        }

        if self.agent_id.is_empty() {
            return Err(ConfigValidationError::InvalidValue {
                field: "agent_id".into(),
                message: "must not be empty".into(),
            });
        }

        let memory = &self.memory;
        if memory.traversal_depth_cap == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "memory.traversal_depth_cap".into(),
                message: "must be greater than 0".into(),
            });
        }

        if memory.max_expand_depth > memory.traversal_depth_cap {
            return Err(ConfigValidationError::InvalidValue {
                field: "memory.max_expand_depth".into(),
                message: "must not exceed memory.traversal_depth_cap".into(),
            });
        }

        if memory.access_log_cap == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "memory.access_log_cap".into(),
                message: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("project is required")]
    MissingProject,

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SDKConfig::default();
        assert_eq!(config.memory.traversal_depth_cap, 20);
        assert_eq!(config.memory.soft_depth_limit, 5);
        assert_eq!(config.memory.access_log_cap, 50);
    }

    #[test]
    fn test_config_builder() {
        let config = SDKConfig::new("test.db", "proj").with_agent("agent-7");

        assert_eq!(config.database_path, PathBuf::from("test.db"));
        assert_eq!(config.project, "proj");
        assert_eq!(config.agent_id, "agent-7");
    }

    #[test]
    fn test_config_validation() {
        let mut config = SDKConfig::default();
        assert!(config.validate().is_err()); // Missing project

        config.project = "proj".into();
        assert!(config.validate().is_ok());

        config.memory.max_expand_depth = 30;
        assert!(config.validate().is_err());

        config.memory.max_expand_depth = 5;
        config.memory.access_log_cap = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: SDKConfig = toml::from_str(
            r#"
            project = "alpha"

            [memory]
            soft_depth_limit = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.project, "alpha");
        assert_eq!(config.memory.soft_depth_limit, 3);
        assert_eq!(config.memory.traversal_depth_cap, 20);
    }
}
