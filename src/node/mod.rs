pub mod error;
pub mod local;
pub mod transport;

pub use error::{NodeError, NodeResult};
pub use local::{LocalCluster, LocalNode};
pub use transport::ChunkTransport;
