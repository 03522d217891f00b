use super::types::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("node id {0} is already registered")]
    DuplicateId(NodeId),

    #[error("node {0} not found")]
    NotFound(NodeId),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
