//! Authentication and conversation sessions
//!
//! Both are explicitly constructed and shared through `Arc`. The conversation
//! session reads the credential from the auth session on every call.

mod auth;
mod conversations;
mod error;

pub use auth::{AuthSession, REGISTERED_MESSAGE};
pub use conversations::{ConversationSession, SessionEvent};
pub use error::{AuthError, ConversationError};
