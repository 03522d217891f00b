use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("upload already in progress for {0}")]
    AlreadyInProgress(String),

    #[error("upload cancelled")]
    Cancelled,

    #[error("chunk {index}: every replica is unreachable or corrupt")]
    ChunkUnavailable { index: u32 },

    #[error("chunk {index}: no assigned node accepted the push")]
    PushFailed { index: u32 },

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("chunk error: {0}")]
    Chunk(#[from] crate::chunk::ChunkError),

    #[error("placement error: {0}")]
    Placement(#[from] crate::placement::PlacementError),

    #[error("metadata error: {0}")]
    Metadata(#[from] crate::metadata::MetadataError),

    #[error("registry error: {0}")]
    Registry(#[from] crate::registry::RegistryError),

    #[error("integrity error: {0}")]
    Integrity(#[from] crate::integrity::IntegrityError),

    #[error("node error: {0}")]
    Node(#[from] crate::node::NodeError),
}

pub type TransferResult<T> = std::result::Result<T, TransferError>;
