//! Pure state transition function

use super::{Effect, Event, SyncState};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SyncState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SyncState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("A message is already being sent in this conversation")]
    Busy,
    #[error("Message is empty")]
    EmptyContent,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs; all I/O is
/// described by the returned effects.
pub fn transition(state: &SyncState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Sending
        // ============================================================
        (_, Event::SendRequested { message }) if message.content.trim().is_empty() => {
            Err(TransitionError::EmptyContent)
        }

        (SyncState::Idle | SyncState::Failed { .. }, Event::SendRequested { message }) => {
            let content = message.content.clone();
            Ok(TransitionResult::new(SyncState::Sending {
                provisional_id: message.id.clone(),
            })
            .with_effect(Effect::AppendMessage { message })
            .with_effect(Effect::Transmit { content }))
        }

        (SyncState::Sending { .. } | SyncState::Reconciling, Event::SendRequested { .. }) => {
            Err(TransitionError::Busy)
        }

        (SyncState::Sending { .. }, Event::TransmitSucceeded) => {
            Ok(TransitionResult::new(SyncState::Reconciling).with_effect(Effect::FetchMessages))
        }

        // Optimistic message stays in the transcript
        (SyncState::Sending { .. }, Event::TransmitFailed { message, kind }) => {
            Ok(failed(message, kind))
        }

        // ============================================================
        // Reconciling
        // ============================================================
        (SyncState::Reconciling, Event::MessagesFetched { messages }) => {
            Ok(TransitionResult::new(SyncState::Idle)
                .with_effect(Effect::ReplaceMessages { messages }))
        }

        (SyncState::Reconciling, Event::FetchFailed { message, kind }) => {
            Ok(failed(message, kind))
        }

        // ============================================================
        // Recovery
        // ============================================================
        (SyncState::Failed { .. }, Event::FailureAcknowledged) => {
            Ok(TransitionResult::new(SyncState::Idle))
        }

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} cannot handle {}",
            state.name(),
            event_name(&event)
        ))),
    }
}

fn failed(message: String, kind: super::FailureKind) -> TransitionResult {
    TransitionResult::new(SyncState::Failed {
        message: message.clone(),
        kind,
    })
    .with_effect(Effect::notify_error(message))
}

fn event_name(event: &Event) -> &'static str {
    match event {
        Event::SendRequested { .. } => "send_requested",
        Event::TransmitSucceeded => "transmit_succeeded",
        Event::TransmitFailed { .. } => "transmit_failed",
        Event::MessagesFetched { .. } => "messages_fetched",
        Event::FetchFailed { .. } => "fetch_failed",
        Event::FailureAcknowledged => "failure_acknowledged",
    }
}
