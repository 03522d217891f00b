use crate::chunk::ChunkHash;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("digest mismatch: expected {expected}, got {actual}")]
    Mismatch {
        expected: ChunkHash,
        actual: ChunkHash,
    },
}

pub type IntegrityResult<T> = std::result::Result<T, IntegrityError>;
