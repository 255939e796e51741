use chatify_core::error::{ProviderError, StorageError};
use chatify_core::message::Message;
use thiserror::Error;

use crate::renderer::RenderUpdate;

/// Where a conversation view is in its send cycle.
///
/// `Reconciled` and `Failed` are reported as transitions only; the view
/// settles back to `Idle` right after either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    Submitted,
    Streaming,
    Finalizing,
    Reconciled,
    Failed,
}

impl SendPhase {
    /// A send holds the view while in one of these phases.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SendPhase::Submitted | SendPhase::Streaming | SendPhase::Finalizing
        )
    }
}

#[derive(Debug, Clone)]
pub enum ChatEvent {
    Phase(SendPhase),
    Render(RenderUpdate),
    Reconciled {
        user_message_id: String,
        assistant_message_id: String,
    },
    Failed {
        error: String,
    },
    /// The answer is shown but was not stored
    PersistFailed {
        error: String,
    },
    Cancelled,
}

/// How one send ended.
#[derive(Debug)]
pub enum SendOutcome {
    Reconciled {
        user: Message,
        assistant: Message,
        tokens_per_second: Option<f64>,
    },
    Failed(ProviderError),
    PersistFailed(StorageError),
    Cancelled,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejected {
    #[error("message is empty")]
    EmptyInput,

    #[error("no authenticated user")]
    NoUser,

    #[error("a message is already being sent")]
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(usize),
    /// Another load or a send was in progress
    Skipped,
}
