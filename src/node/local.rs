//! In-process storage nodes.
//!
//! `LocalCluster` implements the node capability against per-node in-memory
//! chunk maps, with optional on-disk spill. It backs the demo binary and the
//! test suite, where its reachability and corruption hooks stand in for real
//! network and disk faults.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::error::{NodeError, NodeResult};
use super::transport::ChunkTransport;
use crate::chunk::ChunkId;
use crate::registry::{Node, NodeId};

/// A chunk held by one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    key: String,
    data: Vec<u8>,
    stored_at: i64,
}

/// One simulated storage node: a chunk map plus an optional persistence
/// directory the chunks spill to as bincode files.
pub struct LocalNode {
    node_id: NodeId,
    chunks: DashMap<String, StoredChunk>,
    reachable: AtomicBool,
    persistence_path: Option<PathBuf>,
}

impl LocalNode {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            chunks: DashMap::new(),
            reachable: AtomicBool::new(true),
            persistence_path: None,
        }
    }

    /// Enable on-disk spill under `path`, reloading any chunks persisted by
    /// a previous incarnation of this node.
    pub fn with_persistence(mut self, path: impl AsRef<Path>) -> NodeResult<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;
        self.persistence_path = Some(path);
        self.load_persisted()?;
        Ok(self)
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn store(&self, key: String, data: Vec<u8>) -> NodeResult<()> {
        let chunk = StoredChunk {
            key: key.clone(),
            data,
            stored_at: chrono::Utc::now().timestamp(),
        };
        self.persist_chunk(&chunk)?;
        self.chunks.insert(key, chunk);
        Ok(())
    }

    pub fn fetch(&self, key: &str) -> NodeResult<Bytes> {
        self.chunks
            .get(key)
            .map(|c| Bytes::copy_from_slice(&c.data))
            .ok_or_else(|| NodeError::ChunkNotFound {
                node: self.node_id,
                chunk: key.to_string(),
            })
    }

    /// Remove a chunk. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.chunks.remove(key).is_some();
        if removed {
            self.remove_persisted(key);
        }
        removed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.chunks.contains_key(key)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn bytes_used(&self) -> u64 {
        self.chunks.iter().map(|c| c.data.len() as u64).sum()
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Relaxed)
    }

    /// Fault hook: make the node drop every request until restored.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Relaxed);
    }

    /// Fault hook: flip one byte of a stored chunk so retrieval fails hash
    /// verification. Returns whether the chunk was present.
    pub fn corrupt(&self, key: &str) -> bool {
        match self.chunks.get_mut(key) {
            Some(mut chunk) if !chunk.data.is_empty() => {
                chunk.data[0] ^= 0xff;
                true
            }
            _ => false,
        }
    }

    fn spill_file(&self, key: &str) -> Option<PathBuf> {
        self.persistence_path
            .as_ref()
            .map(|dir| dir.join(format!("{}.chunk", hex::encode(key))))
    }

    fn persist_chunk(&self, chunk: &StoredChunk) -> NodeResult<()> {
        if let Some(file) = self.spill_file(&chunk.key) {
            let encoded =
                bincode::serialize(chunk).map_err(|e| NodeError::Storage(e.to_string()))?;
            std::fs::write(file, encoded)?;
        }
        Ok(())
    }

    fn remove_persisted(&self, key: &str) {
        if let Some(file) = self.spill_file(key) {
            let _ = std::fs::remove_file(file);
        }
    }

    fn load_persisted(&self) -> NodeResult<()> {
        let Some(ref dir) = self.persistence_path else {
            return Ok(());
        };

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "chunk").unwrap_or(false) {
                if let Ok(encoded) = std::fs::read(&path) {
                    if let Ok(chunk) = bincode::deserialize::<StoredChunk>(&encoded) {
                        self.chunks.insert(chunk.key.clone(), chunk);
                    }
                }
            }
        }
        Ok(())
    }
}

/// An in-process cluster of `LocalNode`s, addressed by node id.
pub struct LocalCluster {
    nodes: DashMap<NodeId, Arc<LocalNode>>,
    put_delay: Option<Duration>,
}

impl LocalCluster {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
            put_delay: None,
        }
    }

    /// Slow every put down, so tests can observe an upload mid-flight.
    pub fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = Some(delay);
        self
    }

    pub fn add_node(&self, node_id: NodeId) -> Arc<LocalNode> {
        let node = Arc::new(LocalNode::new(node_id));
        self.nodes.insert(node_id, node.clone());
        node
    }

    /// Attach a node built elsewhere, e.g. one configured with persistence.
    pub fn attach(&self, node: Arc<LocalNode>) {
        self.nodes.insert(node.node_id(), node);
    }

    pub fn node(&self, node_id: NodeId) -> Option<Arc<LocalNode>> {
        self.nodes.get(&node_id).map(|n| n.clone())
    }

    pub fn remove_node(&self, node_id: NodeId) -> Option<Arc<LocalNode>> {
        self.nodes.remove(&node_id).map(|(_, n)| n)
    }

    fn resolve(&self, node: &Node) -> NodeResult<Arc<LocalNode>> {
        let local = self
            .node(node.id)
            .ok_or(NodeError::Unreachable(node.id))?;
        if !local.is_reachable() {
            return Err(NodeError::Unreachable(node.id));
        }
        Ok(local)
    }
}

impl Default for LocalCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkTransport for LocalCluster {
    async fn put(&self, node: &Node, chunk_id: &ChunkId, data: Bytes) -> NodeResult<()> {
        let local = self.resolve(node)?;
        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }
        local.store(chunk_id.storage_key(), data.to_vec())
    }

    async fn get(&self, node: &Node, chunk_id: &ChunkId) -> NodeResult<Bytes> {
        let local = self.resolve(node)?;
        local.fetch(&chunk_id.storage_key())
    }

    async fn delete(&self, node: &Node, chunk_id: &ChunkId) -> NodeResult<()> {
        let local = self.resolve(node)?;
        local.remove(&chunk_id.storage_key());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: NodeId) -> Node {
        Node::new(id, "127.0.0.1", 9000 + id as u16)
    }

    #[test]
    fn test_store_and_fetch() {
        let local = LocalNode::new(1);
        local.store("f#0".into(), vec![1, 2, 3, 4]).unwrap();

        assert_eq!(local.fetch("f#0").unwrap(), Bytes::from_static(&[1, 2, 3, 4]));
        assert_eq!(local.chunk_count(), 1);
        assert_eq!(local.bytes_used(), 4);
    }

    #[test]
    fn test_fetch_missing_chunk() {
        let local = LocalNode::new(1);
        assert!(matches!(
            local.fetch("ghost#0"),
            Err(NodeError::ChunkNotFound { node: 1, .. })
        ));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let local = LocalNode::new(1);
        local.store("f#0".into(), vec![1]).unwrap();

        assert!(local.remove("f#0"));
        assert!(!local.remove("f#0"));
        assert!(!local.contains("f#0"));
    }

    #[test]
    fn test_corrupt_flips_stored_bytes() {
        let local = LocalNode::new(1);
        local.store("f#0".into(), vec![0x10, 0x20]).unwrap();

        assert!(local.corrupt("f#0"));
        assert_eq!(local.fetch("f#0").unwrap(), Bytes::from_static(&[0xef, 0x20]));
        assert!(!local.corrupt("ghost#0"));
    }

    #[test]
    fn test_persistence_reload() {
        let dir = tempfile::TempDir::new().unwrap();

        {
            let local = LocalNode::new(1).with_persistence(dir.path()).unwrap();
            local.store("f#0".into(), vec![9, 9, 9]).unwrap();
        }

        // A fresh incarnation of the same node finds the spilled chunk.
        let reborn = LocalNode::new(1).with_persistence(dir.path()).unwrap();
        assert_eq!(reborn.fetch("f#0").unwrap(), Bytes::from_static(&[9, 9, 9]));

        reborn.remove("f#0");
        let empty = LocalNode::new(1).with_persistence(dir.path()).unwrap();
        assert_eq!(empty.chunk_count(), 0);
    }

    #[tokio::test]
    async fn test_cluster_routes_by_node_id() {
        let cluster = LocalCluster::new();
        cluster.add_node(1);
        cluster.add_node(2);

        let id = ChunkId::new("f", 0);
        cluster
            .put(&node(1), &id, Bytes::from_static(b"abc"))
            .await
            .unwrap();

        assert_eq!(cluster.get(&node(1), &id).await.unwrap(), "abc");
        assert!(matches!(
            cluster.get(&node(2), &id).await,
            Err(NodeError::ChunkNotFound { node: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_node() {
        let cluster = LocalCluster::new();
        let local = cluster.add_node(1);
        local.set_reachable(false);

        let id = ChunkId::new("f", 0);
        let result = cluster.put(&node(1), &id, Bytes::from_static(b"x")).await;
        assert!(matches!(result, Err(NodeError::Unreachable(1))));

        local.set_reachable(true);
        cluster
            .put(&node(1), &id, Bytes::from_static(b"x"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_node_is_unreachable() {
        let cluster = LocalCluster::new();
        let id = ChunkId::new("f", 0);
        assert!(matches!(
            cluster.get(&node(42), &id).await,
            Err(NodeError::Unreachable(42))
        ));
    }
}
