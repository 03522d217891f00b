use parking_lot::RwLock;
use std::sync::Arc;

use super::error::{TransferError, TransferResult};
use super::types::{UploadEvent, UploadState};

/// Tracks one upload through
/// `Idle -> Partitioning -> Planning -> Pushing -> Committing -> Done`.
///
/// Clones share the same state cell, so a cancel issued through one handle
/// is visible to the worker holding another.
pub struct UploadStateMachine {
    state: Arc<RwLock<UploadState>>,
}

impl UploadStateMachine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(UploadState::Idle)),
        }
    }

    pub fn current_state(&self) -> UploadState {
        self.state.read().clone()
    }

    /// Apply an event, returning the new state.
    pub fn transition(&self, event: UploadEvent) -> TransferResult<UploadState> {
        let mut state = self.state.write();

        let new_state = match (&*state, &event) {
            (UploadState::Idle, UploadEvent::Begin) => UploadState::Partitioning,

            // A zero-chunk file has nothing to plan or push.
            (UploadState::Partitioning, UploadEvent::PartitionFinished { chunk_count: 0 }) => {
                UploadState::Committing
            }
            (UploadState::Partitioning, UploadEvent::PartitionFinished { .. }) => {
                UploadState::Planning
            }

            (UploadState::Planning, UploadEvent::PlanFinished { chunk_count }) => {
                UploadState::Pushing {
                    completed: 0,
                    total: *chunk_count,
                }
            }

            (UploadState::Pushing { completed, total }, UploadEvent::ChunkPushed { .. }) => {
                UploadState::Pushing {
                    completed: completed + 1,
                    total: *total,
                }
            }

            (UploadState::Pushing { .. }, UploadEvent::AllChunksPushed) => UploadState::Committing,

            (UploadState::Committing, UploadEvent::CommitFinished) => UploadState::Done,

            (current, UploadEvent::Fail { error })
                if !current.is_terminal() && !matches!(current, UploadState::Idle) =>
            {
                UploadState::Failed {
                    error: error.clone(),
                }
            }

            (current, UploadEvent::Cancel) if !current.is_terminal() => UploadState::Failed {
                error: "upload cancelled".into(),
            },

            _ => {
                return Err(TransferError::InvalidStateTransition(format!(
                    "cannot handle {:?} in state {:?}",
                    event, *state
                )));
            }
        };

        *state = new_state.clone();
        Ok(new_state)
    }
}

impl Default for UploadStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for UploadStateMachine {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        assert_eq!(UploadStateMachine::new().current_state(), UploadState::Idle);
    }

    #[test]
    fn test_full_upload_path() {
        let sm = UploadStateMachine::new();

        sm.transition(UploadEvent::Begin).unwrap();
        sm.transition(UploadEvent::PartitionFinished { chunk_count: 2 })
            .unwrap();
        sm.transition(UploadEvent::PlanFinished { chunk_count: 2 })
            .unwrap();

        sm.transition(UploadEvent::ChunkPushed { index: 1 }).unwrap();
        let state = sm.transition(UploadEvent::ChunkPushed { index: 0 }).unwrap();
        assert_eq!(
            state,
            UploadState::Pushing {
                completed: 2,
                total: 2
            }
        );

        sm.transition(UploadEvent::AllChunksPushed).unwrap();
        sm.transition(UploadEvent::CommitFinished).unwrap();
        assert_eq!(sm.current_state(), UploadState::Done);
        assert!(sm.current_state().is_terminal());
    }

    #[test]
    fn test_zero_chunk_short_circuit() {
        let sm = UploadStateMachine::new();

        sm.transition(UploadEvent::Begin).unwrap();
        let state = sm
            .transition(UploadEvent::PartitionFinished { chunk_count: 0 })
            .unwrap();
        assert_eq!(state, UploadState::Committing);

        sm.transition(UploadEvent::CommitFinished).unwrap();
        assert_eq!(sm.current_state(), UploadState::Done);
    }

    #[test]
    fn test_fail_from_any_active_state() {
        for advance in 1..=4 {
            let sm = UploadStateMachine::new();
            let events = [
                UploadEvent::Begin,
                UploadEvent::PartitionFinished { chunk_count: 1 },
                UploadEvent::PlanFinished { chunk_count: 1 },
                UploadEvent::AllChunksPushed,
            ];
            for event in events.into_iter().take(advance) {
                sm.transition(event).unwrap();
            }

            sm.transition(UploadEvent::Fail {
                error: "node gone".into(),
            })
            .unwrap();
            assert!(sm.current_state().is_failed());
        }
    }

    #[test]
    fn test_fail_from_idle_is_invalid() {
        let sm = UploadStateMachine::new();
        let result = sm.transition(UploadEvent::Fail {
            error: "too early".into(),
        });
        assert!(matches!(
            result,
            Err(TransferError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_cancel_is_visible_through_clones() {
        let sm = UploadStateMachine::new();
        let handle = sm.clone();

        sm.transition(UploadEvent::Begin).unwrap();
        handle.transition(UploadEvent::Cancel).unwrap();

        match sm.current_state() {
            UploadState::Failed { error } => assert!(error.contains("cancelled")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn test_cancel_after_done_is_invalid() {
        let sm = UploadStateMachine::new();
        sm.transition(UploadEvent::Begin).unwrap();
        sm.transition(UploadEvent::PartitionFinished { chunk_count: 0 })
            .unwrap();
        sm.transition(UploadEvent::CommitFinished).unwrap();

        assert!(sm.transition(UploadEvent::Cancel).is_err());
        assert_eq!(sm.current_state(), UploadState::Done);
    }

    #[test]
    fn test_invalid_transition() {
        let sm = UploadStateMachine::new();
        assert!(sm.transition(UploadEvent::AllChunksPushed).is_err());
    }
}
