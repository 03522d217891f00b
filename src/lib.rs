//! shardstore: a client-side engine for distributed chunk storage.
//!
//! Files are split into fixed-size chunks with BLAKE3 digests, placed on
//! storage nodes by deterministic round-robin rotation, tracked in a durable
//! metadata store, and reassembled with per-chunk verification and replica
//! fallback. Storage nodes themselves are external: the orchestrator talks
//! to them through the [`node::ChunkTransport`] capability.

pub mod chunk;
pub mod config;
pub mod integrity;
pub mod metadata;
pub mod node;
pub mod orchestrator;
pub mod placement;
pub mod registry;

pub use chunk::{Chunk, ChunkHash, ChunkId, Partitioner};
pub use config::{NodeSeed, RetryPolicy, StorageConfig};
pub use integrity::IntegrityVerifier;
pub use metadata::{ChunkRecord, FileRecord, MetadataStore};
pub use node::{ChunkTransport, LocalCluster, LocalNode};
pub use orchestrator::{
    ReplicationReport, StorageEvent, TransferError, TransferOrchestrator, UploadState,
};
pub use placement::{Placement, PlacementPlanner};
pub use registry::{Node, NodeId, NodeRegistry, NodeStatus};
