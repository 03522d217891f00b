mod error;
mod registry;
mod types;

pub use error::{RegistryError, RegistryResult};
pub use registry::NodeRegistry;
pub use types::{Node, NodeId, NodeStatus};
