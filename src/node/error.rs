use crate::registry::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("node {0} is unreachable")]
    Unreachable(NodeId),

    #[error("node {node} does not hold chunk {chunk}")]
    ChunkNotFound { node: NodeId, chunk: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NodeResult<T> = std::result::Result<T, NodeError>;
