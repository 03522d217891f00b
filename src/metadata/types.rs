use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::chunk::ChunkHash;
use crate::registry::NodeId;

/// Where one chunk lives: its recorded digest and the ordered list of nodes
/// that acknowledged it during upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub index: u32,
    pub hash: ChunkHash,
    pub nodes: Vec<NodeId>,
}

/// Durable metadata describing a file's chunking and placement.
///
/// `chunks` has exactly `chunk_count` entries in ascending index order. A
/// record exists only for fully uploaded files; it is replaced wholesale on
/// re-upload of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub name: String,
    pub size: u64,
    pub chunk_count: u32,
    pub chunks: Vec<ChunkRecord>,
    /// The replication factor requested at upload time. Individual chunks
    /// may hold fewer replicas (degraded placement or dropped nodes), which
    /// is what makes under-replication observable.
    pub replication_factor: u32,
    pub created_at: i64,
}

impl FileRecord {
    pub fn new(
        name: impl Into<String>,
        size: u64,
        replication_factor: u32,
        chunks: Vec<ChunkRecord>,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            chunk_count: chunks.len() as u32,
            chunks,
            replication_factor,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn nodes_for_chunk(&self, index: u32) -> Option<&[NodeId]> {
        self.chunks
            .iter()
            .find(|c| c.index == index)
            .map(|c| c.nodes.as_slice())
    }

    /// Every node id that holds at least one chunk of this file.
    pub fn all_nodes(&self) -> BTreeSet<NodeId> {
        self.chunks
            .iter()
            .flat_map(|c| c.nodes.iter().copied())
            .collect()
    }
}
