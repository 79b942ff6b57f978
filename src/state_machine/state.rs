//! Synchronization state of one conversation

use crate::domain::MessageId;
use serde::{Deserialize, Serialize};

/// Why a send did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Credential absent or rejected; the user should log in again
    Unauthorized,
    Network,
    /// Any other server-side rejection
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncState {
    /// Local transcript matches the last server copy (or nothing was sent yet)
    #[default]
    Idle,

    /// Provisional message appended, waiting for the server to accept it
    Sending { provisional_id: MessageId },

    /// Server accepted the message, refetching the authoritative transcript
    Reconciling,

    /// Transmit or refetch failed; the optimistic message is kept
    Failed { message: String, kind: FailureKind },
}

impl SyncState {
    /// A send is outstanding
    pub fn is_busy(&self) -> bool {
        matches!(self, SyncState::Sending { .. } | SyncState::Reconciling)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SyncState::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Sending { .. } => "sending",
            SyncState::Reconciling => "reconciling",
            SyncState::Failed { .. } => "failed",
        }
    }
}
