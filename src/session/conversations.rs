//! Conversation set and optimistic message synchronization
//!
//! Each conversation carries its own `SyncState`. Sends run the pure state
//! machine: local effects are applied under the state lock, remote effects
//! are executed here and fed back as events. Everything is keyed by
//! conversation id, never by the current selection.

use super::auth::AuthSession;
use super::ConversationError;
use crate::api::{Api, Transport};
use crate::domain::{Conversation, ConversationId, Credential, Message, Role};
use crate::notify::NotificationChannel;
use crate::state_machine::{transition, Effect, Event, SyncState, TransitionError};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Change notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The whole set was replaced (relist or clear)
    ConversationsReplaced,
    /// Title or transcript of one conversation changed
    ConversationChanged { id: ConversationId },
    SelectionChanged { selected: Option<ConversationId> },
    SyncStateChanged { id: ConversationId, state: SyncState },
}

struct Entry {
    conversation: Conversation,
    sync: SyncState,
}

impl Entry {
    fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            sync: SyncState::Idle,
        }
    }
}

#[derive(Default)]
struct State {
    /// Server order
    entries: Vec<Entry>,
    selected: Option<ConversationId>,
}

impl State {
    fn entry_mut(&mut self, id: ConversationId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.conversation.id == id)
    }

    fn entry(&self, id: ConversationId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.conversation.id == id)
    }
}

pub struct ConversationSession<T> {
    api: Api<T>,
    auth: Arc<AuthSession<T>>,
    notifications: NotificationChannel,
    state: RwLock<State>,
    events: broadcast::Sender<SessionEvent>,
}

impl<T: Transport> ConversationSession<T> {
    pub fn new(auth: Arc<AuthSession<T>>, notifications: NotificationChannel) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api: auth.api().clone(),
            auth,
            notifications,
            state: RwLock::new(State::default()),
            events,
        }
    }

    // ========================================================================
    // Remote operations
    // ========================================================================

    /// Fetch the server-side set and replace the local one with it
    ///
    /// Sync states survive for ids still present, as do the provisional
    /// messages of a conversation that is mid-send or failed. A selection
    /// pointing at a vanished conversation is cleared.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ConversationError> {
        let credential = self.require_credential()?;
        let conversations = self
            .api
            .list_conversations(&credential)
            .await
            .map_err(|e| self.report(ConversationError::from_api(&e)))?;

        tracing::info!(count = conversations.len(), "Conversations listed");
        self.replace_all(conversations.clone());
        Ok(conversations)
    }

    /// Create a conversation on the server, append it and select it
    pub async fn create_conversation(&self, title: &str) -> Result<Conversation, ConversationError> {
        let credential = self.require_credential()?;
        let conversation = self
            .api
            .create_conversation(&credential, title)
            .await
            .map_err(|e| self.report(ConversationError::from_api(&e)))?;

        let id = conversation.id;
        {
            let mut state = self.write_state();
            match state.entry_mut(id) {
                Some(entry) => entry.conversation = conversation.clone(),
                None => state.entries.push(Entry::new(conversation.clone())),
            }
            state.selected = Some(id);
        }

        tracing::info!(conv_id = %id, title = %conversation.title, "Conversation created");
        self.emit(SessionEvent::ConversationChanged { id });
        self.emit(SessionEvent::SelectionChanged { selected: Some(id) });
        Ok(conversation)
    }

    /// Send a user message with an optimistic local append
    ///
    /// The provisional message is shown immediately. On success the
    /// transcript is replaced by the server copy; on failure the provisional
    /// message stays, the conversation is marked `Failed` and an error notice
    /// is shown.
    pub async fn send_message(
        &self,
        id: ConversationId,
        content: &str,
    ) -> Result<(), ConversationError> {
        if content.trim().is_empty() {
            return Err(ConversationError::EmptyMessage);
        }
        if self.read_state().entry(id).is_none() {
            return Err(ConversationError::UnknownConversation(id));
        }
        let credential = self.require_credential()?;

        let start = Instant::now();
        let mut pending: VecDeque<Effect> = self
            .apply(
                id,
                Event::SendRequested {
                    message: Message::provisional(content),
                },
            )?
            .into();
        let mut outcome = Ok(());

        while let Some(effect) = pending.pop_front() {
            let Some(event) = self
                .execute_effect(id, &credential, effect, &mut outcome)
                .await
            else {
                continue;
            };

            match self.apply(id, event) {
                Ok(effects) => pending.extend(effects),
                Err(ConversationError::UnknownConversation(_)) => {
                    tracing::warn!(conv_id = %id, "Conversation left the set mid-send, dropping result");
                    // Nothing left to mark Failed
                    if let Err(err) = &outcome {
                        self.notifications.error(err.to_string());
                    }
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            conv_id = %id,
            duration_ms = %start.elapsed().as_millis(),
            ok = outcome.is_ok(),
            "Send finished"
        );
        outcome
    }

    // ========================================================================
    // Local operations
    // ========================================================================

    /// Select a known conversation; returns false (and changes nothing) otherwise
    pub fn select_conversation(&self, id: ConversationId) -> bool {
        {
            let mut state = self.write_state();
            if state.entry(id).is_none() {
                return false;
            }
            if state.selected == Some(id) {
                return true;
            }
            state.selected = Some(id);
        }
        self.emit(SessionEvent::SelectionChanged { selected: Some(id) });
        true
    }

    /// Leave the `Failed` state without sending
    pub fn acknowledge_failure(&self, id: ConversationId) -> Result<(), ConversationError> {
        self.apply(id, Event::FailureAcknowledged).map(|_| ())
    }

    /// Drop all local conversation state (on logout)
    pub fn clear(&self) {
        {
            let mut state = self.write_state();
            state.entries.clear();
            state.selected = None;
        }
        self.emit(SessionEvent::ConversationsReplaced);
        self.emit(SessionEvent::SelectionChanged { selected: None });
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.read_state()
            .entries
            .iter()
            .map(|e| e.conversation.clone())
            .collect()
    }

    pub fn conversation(&self, id: ConversationId) -> Option<Conversation> {
        self.read_state().entry(id).map(|e| e.conversation.clone())
    }

    pub fn selected_id(&self) -> Option<ConversationId> {
        self.read_state().selected
    }

    pub fn selected(&self) -> Option<Conversation> {
        let state = self.read_state();
        state
            .selected
            .and_then(|id| state.entry(id))
            .map(|e| e.conversation.clone())
    }

    pub fn sync_state(&self, id: ConversationId) -> Option<SyncState> {
        self.read_state().entry(id).map(|e| e.sync.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Run one transition for `id`, applying transcript effects in place
    ///
    /// Returns the effects that need I/O.
    fn apply(&self, id: ConversationId, event: Event) -> Result<Vec<Effect>, ConversationError> {
        let (remote, transcript_changed, new_state) = {
            let mut state = self.write_state();
            let entry = state
                .entry_mut(id)
                .ok_or(ConversationError::UnknownConversation(id))?;

            let result = transition(&entry.sync, event).map_err(|e| match e {
                TransitionError::Busy => ConversationError::Busy(id),
                TransitionError::EmptyContent => ConversationError::EmptyMessage,
                TransitionError::InvalidTransition(msg) => ConversationError::InvalidState(msg),
            })?;

            tracing::debug!(
                conv_id = %id,
                from = entry.sync.name(),
                to = result.new_state.name(),
                "Sync state transition"
            );

            let mut transcript_changed = false;
            let mut remote = Vec::new();
            for effect in result.effects {
                if effect.is_local() {
                    transcript_changed |= effect.apply_to(&mut entry.conversation.messages);
                } else {
                    remote.push(effect);
                }
            }
            entry.sync = result.new_state.clone();
            (remote, transcript_changed, result.new_state)
        };

        if transcript_changed {
            self.emit(SessionEvent::ConversationChanged { id });
        }
        self.emit(SessionEvent::SyncStateChanged {
            id,
            state: new_state,
        });
        Ok(remote)
    }

    /// Execute one remote effect, returning the event it produced
    async fn execute_effect(
        &self,
        id: ConversationId,
        credential: &Credential,
        effect: Effect,
        outcome: &mut Result<(), ConversationError>,
    ) -> Option<Event> {
        match effect {
            Effect::Transmit { content } => {
                match self
                    .api
                    .post_message(credential, id, Role::User, &content)
                    .await
                {
                    Ok(_reply) => Some(Event::TransmitSucceeded),
                    Err(e) => {
                        let err = ConversationError::from_api(&e);
                        let event = Event::TransmitFailed {
                            message: err.to_string(),
                            kind: err.failure_kind(),
                        };
                        *outcome = Err(err);
                        Some(event)
                    }
                }
            }

            Effect::FetchMessages => match self.api.list_messages(credential, id).await {
                Ok(messages) => Some(Event::MessagesFetched { messages }),
                Err(e) => {
                    let err = ConversationError::from_api(&e);
                    let event = Event::FetchFailed {
                        message: err.to_string(),
                        kind: err.failure_kind(),
                    };
                    *outcome = Err(err);
                    Some(event)
                }
            },

            Effect::NotifyError { message } => {
                tracing::warn!(conv_id = %id, error = %message, "Send failed");
                self.notifications.error(message);
                None
            }

            // Applied under the state lock by `apply`
            Effect::AppendMessage { .. } | Effect::ReplaceMessages { .. } => None,
        }
    }

    fn replace_all(&self, conversations: Vec<Conversation>) {
        let selection_cleared = {
            let mut state = self.write_state();
            let mut previous: HashMap<ConversationId, Entry> = state
                .entries
                .drain(..)
                .map(|e| (e.conversation.id, e))
                .collect();

            state.entries = conversations
                .into_iter()
                .map(|mut conversation| {
                    let Some(old) = previous.remove(&conversation.id) else {
                        return Entry::new(conversation);
                    };
                    // Unsent messages stay visible until the send settles or is acknowledged
                    if old.sync.is_busy() || old.sync.is_failed() {
                        conversation.messages.extend(
                            old.conversation
                                .messages
                                .into_iter()
                                .filter(Message::is_provisional),
                        );
                    }
                    Entry {
                        conversation,
                        sync: old.sync,
                    }
                })
                .collect();

            match state.selected {
                Some(id) if state.entry(id).is_none() => {
                    state.selected = None;
                    true
                }
                _ => false,
            }
        };

        self.emit(SessionEvent::ConversationsReplaced);
        if selection_cleared {
            self.emit(SessionEvent::SelectionChanged { selected: None });
        }
    }

    fn require_credential(&self) -> Result<Credential, ConversationError> {
        self.auth
            .credential()
            .ok_or_else(|| self.report(ConversationError::not_logged_in()))
    }

    fn report(&self, err: ConversationError) -> ConversationError {
        tracing::warn!(error = %err, "Conversation request failed");
        self.notifications.error(err.to_string());
        err
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
