//! Events that drive a conversation's synchronization

use super::FailureKind;
use crate::domain::Message;

#[derive(Debug, Clone)]
pub enum Event {
    /// User submitted `message` (a provisional user message)
    SendRequested { message: Message },

    /// Server accepted the message
    TransmitSucceeded,
    TransmitFailed { message: String, kind: FailureKind },

    /// Authoritative transcript arrived
    MessagesFetched { messages: Vec<Message> },
    FetchFailed { message: String, kind: FailureKind },

    /// User saw the failure
    FailureAcknowledged,
}
