//! chatsync - client core for multi-conversation chat with an assistant
//!
//! Holds the authentication credential, keeps locally displayed conversations
//! consistent with the server across optimistic sends, and surfaces failures
//! as short-lived notices.

pub mod api;
pub mod config;
pub mod domain;
pub mod notify;
pub mod session;
pub mod state_machine;
pub mod storage;

pub use api::{Api, ApiError, HttpTransport, LoggingTransport, Transport};
pub use config::ClientConfig;
pub use notify::{NotificationChannel, NotificationEvent, Severity};
pub use session::{AuthError, AuthSession, ConversationError, ConversationSession, SessionEvent};
pub use state_machine::{FailureKind, SyncState};
pub use storage::{CredentialStore, FileStore, MemoryStore};
