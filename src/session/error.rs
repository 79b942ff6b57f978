//! Session error types

use crate::api::{ApiError, ApiErrorKind};
use crate::domain::ConversationId;
use crate::state_machine::FailureKind;
use crate::storage::StoreError;
use thiserror::Error;

/// Failures of login, registration and credential persistence
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("{0}")]
    LoginRejected(String),
    #[error("{0}")]
    RegistrationRejected(String),
    #[error("{0}")]
    Network(String),
    #[error("Failed to save credential: {0}")]
    Storage(String),
}

impl AuthError {
    pub(crate) fn login(err: &ApiError) -> Self {
        match err.kind {
            ApiErrorKind::Network => AuthError::Network(err.user_message()),
            ApiErrorKind::Status | ApiErrorKind::Decode => {
                AuthError::LoginRejected(err.user_message())
            }
        }
    }

    pub(crate) fn registration(err: &ApiError) -> Self {
        match err.kind {
            ApiErrorKind::Network => AuthError::Network(err.user_message()),
            ApiErrorKind::Status | ApiErrorKind::Decode => {
                AuthError::RegistrationRejected(err.user_message())
            }
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Storage(err.to_string())
    }
}

/// Failures of conversation operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    /// Credential absent, or rejected by the server
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Network(String),
    #[error("{0}")]
    Rejected(String),
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Unknown conversation {0}")]
    UnknownConversation(ConversationId),
    #[error("A message is already being sent in conversation {0}")]
    Busy(ConversationId),
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ConversationError {
    pub(crate) fn not_logged_in() -> Self {
        ConversationError::Unauthorized("Not logged in".to_string())
    }

    pub(crate) fn from_api(err: &ApiError) -> Self {
        if err.is_unauthorized() {
            return ConversationError::Unauthorized(err.user_message());
        }
        match err.kind {
            ApiErrorKind::Network => ConversationError::Network(err.user_message()),
            ApiErrorKind::Status | ApiErrorKind::Decode => {
                ConversationError::Rejected(err.user_message())
            }
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ConversationError::Unauthorized(_))
    }

    /// Classification recorded in a `Failed` sync state
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ConversationError::Unauthorized(_) => FailureKind::Unauthorized,
            ConversationError::Network(_) => FailureKind::Network,
            _ => FailureKind::Rejected,
        }
    }
}
