//! Narrow persistence interfaces consumed by the delivery core.
//!
//! Implementations are blocking; async callers run them on
//! `tokio::task::spawn_blocking`.

use anyhow::Result;
use uuid::Uuid;

use crate::models::{Message, MessageDraft, Notification, PreferenceSet};

pub trait MessageStore: Send + Sync {
    /// Confirmed messages between `viewer` and `peer`, oldest first.
    fn load_conversation(&self, viewer: Uuid, peer: Uuid, limit: u32) -> Result<Vec<Message>>;

    /// Durably accepts a message, assigning its permanent id and creation time.
    /// The returned message is in the `sent` stage.
    fn append_message(&self, draft: &MessageDraft) -> Result<Message>;

    /// Moves `sent` messages addressed to `recipient` to `delivered`.
    /// Returns only the messages that actually changed.
    fn mark_delivered(&self, recipient: Uuid, ids: &[Uuid]) -> Result<Vec<Message>>;

    /// Marks every message from `peer` to `viewer` read. Returns the number changed.
    fn mark_conversation_read(&self, viewer: Uuid, peer: Uuid) -> Result<usize>;
}

/// Outcome of marking a single notification read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Marked,
    AlreadyRead,
    NotFound,
}

pub trait NotificationStore: Send + Sync {
    fn append_notification(&self, notification: &Notification) -> Result<Notification>;

    /// Newest first.
    fn list_notifications(&self, user_id: Uuid, limit: u32) -> Result<Vec<Notification>>;

    fn unread_count(&self, user_id: Uuid) -> Result<u64>;

    fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<ReadOutcome>;

    /// Marks the user's unread notifications read, bounded by the newest
    /// notification that existed when the sweep started (or by `up_to`).
    fn mark_all_read(&self, user_id: Uuid, up_to: Option<Uuid>) -> Result<usize>;
}

pub trait PreferenceStore: Send + Sync {
    /// `None` when the user never saved preferences.
    fn load_preferences(&self, user_id: Uuid) -> Result<Option<PreferenceSet>>;

    /// Last write wins.
    fn save_preferences(&self, user_id: Uuid, prefs: &PreferenceSet) -> Result<()>;
}
