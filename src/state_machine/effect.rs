//! Effects produced by state transitions

use crate::domain::Message;

/// Effects to be executed after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Show `message` in the local transcript before the server confirms it
    AppendMessage { message: Message },

    /// Post the user's message to the server
    Transmit { content: String },

    /// Refetch the full transcript
    FetchMessages,

    /// Replace the local transcript with the server copy
    ReplaceMessages { messages: Vec<Message> },

    /// Push an error notice to the user
    NotifyError { message: String },
}

impl Effect {
    pub fn notify_error(message: impl Into<String>) -> Self {
        Effect::NotifyError {
            message: message.into(),
        }
    }

    /// Transcript effects are applied locally; the rest need I/O
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Effect::AppendMessage { .. } | Effect::ReplaceMessages { .. }
        )
    }

    /// Apply a transcript effect; returns whether `messages` changed
    pub fn apply_to(&self, messages: &mut Vec<Message>) -> bool {
        match self {
            Effect::AppendMessage { message } => {
                messages.push(message.clone());
                true
            }
            Effect::ReplaceMessages { messages: fresh } => {
                messages.clone_from(fresh);
                true
            }
            Effect::Transmit { .. } | Effect::FetchMessages | Effect::NotifyError { .. } => false,
        }
    }
}
