pub mod error;
pub mod partitioner;
pub mod types;

pub use error::{ChunkError, ChunkResult};
pub use partitioner::Partitioner;
pub use types::{Chunk, ChunkHash, ChunkId};
