use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::registry::NodeId;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Retry policy for per-node chunk pushes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per node per chunk before the node is dropped from the
    /// chunk's mapping.
    pub max_attempts: u32,

    /// First backoff interval; doubles per retry up to `max_backoff`.
    pub initial_backoff: Duration,

    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

/// A node known at startup, registered before the first transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSeed {
    pub id: NodeId,
    pub host: String,
    pub port: u16,
}

/// Configuration surface consumed by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Chunk size in bytes.
    pub chunk_size: usize,

    /// Requested replicas per chunk. Placement degrades to the cluster size
    /// when fewer nodes are online.
    pub replication_factor: usize,

    /// Cap on concurrent chunk transfers per upload/download.
    pub max_concurrent_transfers: usize,

    pub push_retry: RetryPolicy,

    /// Initial node list.
    #[serde(default)]
    pub initial_nodes: Vec<NodeSeed>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024, // 1MB chunks
            replication_factor: 2,
            max_concurrent_transfers: num_cpus::get(),
            push_retry: RetryPolicy::default(),
            initial_nodes: Vec::new(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".into()));
        }
        if self.replication_factor == 0 {
            return Err(ConfigError::Invalid(
                "replication_factor must be at least 1".into(),
            ));
        }
        if self.max_concurrent_transfers == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_transfers must be at least 1".into(),
            ));
        }
        if self.push_retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "push_retry.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Load and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(StorageConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let config = StorageConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_replication() {
        let config = StorageConfig {
            replication_factor: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = StorageConfig {
            chunk_size: 4096,
            replication_factor: 3,
            ..Default::default()
        };
        config.initial_nodes.push(NodeSeed {
            id: 1,
            host: "127.0.0.1".into(),
            port: 9001,
        });
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = StorageConfig::from_file(&path).unwrap();
        assert_eq!(loaded.chunk_size, 4096);
        assert_eq!(loaded.replication_factor, 3);
        assert_eq!(loaded.initial_nodes.len(), 1);
    }
}
