use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlacementError {
    #[error("no storage nodes available")]
    NoNodesAvailable,

    #[error("invalid replication factor: {0}")]
    InvalidReplicationFactor(usize),
}

pub type PlacementResult<T> = std::result::Result<T, PlacementError>;
