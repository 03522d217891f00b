use serde::{Deserialize, Serialize};

/// Upload lifecycle. `Failed` is terminal and reachable from every state
/// except `Idle`; a zero-chunk file skips straight from partitioning to
/// commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum UploadState {
    Idle,
    Partitioning,
    Planning,
    Pushing { completed: u32, total: u32 },
    Committing,
    Done,
    Failed { error: String },
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Done | UploadState::Failed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, UploadState::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    Begin,
    PartitionFinished { chunk_count: u32 },
    PlanFinished { chunk_count: u32 },
    ChunkPushed { index: u32 },
    AllChunksPushed,
    CommitFinished,
    Fail { error: String },
    Cancel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Error,
}

/// Events surfaced to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StorageEvent {
    Progress {
        /// 0..100, chunk-granular.
        percent: f32,
        message: String,
    },
    Log {
        level: LogLevel,
        message: String,
        timestamp: i64,
    },
}

/// Assigned vs live replica counts for one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkReplication {
    pub index: u32,
    /// Nodes recorded in the chunk's mapping at upload time.
    pub assigned: usize,
    /// Assigned nodes that are still registered and online.
    pub live: usize,
}

impl ChunkReplication {
    pub fn is_under_replicated(&self) -> bool {
        self.live < self.assigned
    }
}

/// Per-file replication health. Deregistering a node never rewrites
/// FileRecords, so this is how under-replication becomes observable; repair
/// is out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationReport {
    pub name: String,
    pub replication_factor: u32,
    pub chunks: Vec<ChunkReplication>,
}

impl ReplicationReport {
    pub fn under_replicated(&self) -> Vec<&ChunkReplication> {
        self.chunks
            .iter()
            .filter(|c| c.is_under_replicated())
            .collect()
    }

    pub fn is_fully_replicated(&self) -> bool {
        self.under_replicated().is_empty()
    }
}
