//! User-visible notices that expire on their own
//!
//! Entries are shown in insertion order and removed exactly once: either by
//! `dismiss` or by a timer task 5 s after creation, whichever comes first.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;

/// How long an entry stays visible
pub const NOTIFICATION_TTL: Duration = Duration::from_millis(5000);

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationEntry {
    pub id: EntryId,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    Expired,
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    Shown(NotificationEntry),
    Removed { id: EntryId, reason: RemovalReason },
}

struct Pending {
    entry: NotificationEntry,
    expiry: AbortHandle,
}

struct Inner {
    entries: Mutex<Vec<Pending>>,
    next_id: AtomicU64,
    events: broadcast::Sender<NotificationEvent>,
}

impl Inner {
    fn remove(&self, id: EntryId, reason: RemovalReason) -> bool {
        let removed = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries
                .iter()
                .position(|p| p.entry.id == id)
                .map(|index| entries.remove(index))
        };

        let Some(pending) = removed else {
            return false;
        };
        if reason == RemovalReason::Dismissed {
            pending.expiry.abort();
        }
        tracing::debug!(entry_id = %id, ?reason, "Notification removed");
        let _ = self.events.send(NotificationEvent::Removed { id, reason });
        true
    }
}

/// Shared handle to the notification queue
///
/// Must be used from within a Tokio runtime; each entry owns a timer task.
#[derive(Clone)]
pub struct NotificationChannel {
    inner: Arc<Inner>,
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationChannel {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                events,
            }),
        }
    }

    pub fn notify(&self, message: impl Into<String>, severity: Severity) -> EntryId {
        let id = EntryId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = NotificationEntry {
            id,
            message: message.into(),
            severity,
            created_at: Utc::now(),
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let expiry = tokio::spawn(async move {
            tokio::time::sleep(NOTIFICATION_TTL).await;
            if let Some(inner) = weak.upgrade() {
                inner.remove(id, RemovalReason::Expired);
            }
        })
        .abort_handle();

        tracing::debug!(entry_id = %id, ?severity, message = %entry.message, "Notification shown");

        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Pending {
                entry: entry.clone(),
                expiry,
            });
        let _ = self.inner.events.send(NotificationEvent::Shown(entry));
        id
    }

    pub fn error(&self, message: impl Into<String>) -> EntryId {
        self.notify(message, Severity::Error)
    }

    pub fn success(&self, message: impl Into<String>) -> EntryId {
        self.notify(message, Severity::Success)
    }

    /// Remove an entry now; no-op if it is already gone
    pub fn dismiss(&self, id: EntryId) {
        self.inner.remove(id, RemovalReason::Dismissed);
    }

    pub fn entries(&self) -> Vec<NotificationEntry> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|p| p.entry.clone())
            .collect()
    }

    /// Oldest visible entry (the banner)
    pub fn current(&self) -> Option<NotificationEntry> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .first()
            .map(|p| p.entry.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.inner.events.subscribe()
    }
}
