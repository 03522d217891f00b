use async_trait::async_trait;
use bytes::Bytes;

use super::error::NodeResult;
use crate::chunk::ChunkId;
use crate::registry::Node;

/// The storage-node capability the orchestrator consumes.
///
/// How a node actually persists bytes is its own business; the orchestrator
/// only needs put/get/delete keyed by `(filename, chunkIndex)`. Implementors
/// must be safe to call concurrently for distinct nodes and chunks.
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    /// Store chunk bytes on a node. Acknowledgement means the node holds
    /// the chunk durably enough to serve a later `get`.
    async fn put(&self, node: &Node, chunk_id: &ChunkId, data: Bytes) -> NodeResult<()>;

    /// Fetch chunk bytes from a node.
    async fn get(&self, node: &Node, chunk_id: &ChunkId) -> NodeResult<Bytes>;

    /// Remove a chunk from a node. Removing an absent chunk is not an error.
    async fn delete(&self, node: &Node, chunk_id: &ChunkId) -> NodeResult<()>;
}
