use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(usize),

    #[error("chunk sequence is not contiguous at index {0}")]
    MissingChunk(u32),
}

pub type ChunkResult<T> = std::result::Result<T, ChunkError>;
