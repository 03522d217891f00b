mod error;
mod orchestrator;
mod state_machine;
mod types;

pub use error::{TransferError, TransferResult};
pub use orchestrator::TransferOrchestrator;
pub use state_machine::UploadStateMachine;
pub use types::{
    ChunkReplication, LogLevel, ReplicationReport, StorageEvent, UploadEvent, UploadState,
};
