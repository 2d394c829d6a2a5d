use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use souq_types::events::DomainEvent;
use souq_types::models::{Notification, PreferenceSet};
use souq_types::store::{NotificationStore, PreferenceStore};

use crate::email::{EmailRelay, LogEmailRelay};
use crate::render::render;

/// Turns one domain event into at most one notification for one recipient.
///
/// A disabled category is a policy decision, not a failure: `notify` returns
/// `Ok(None)` and nothing is retried. Storage errors while appending the
/// notification are the only errors surfaced to the caller.
#[derive(Clone)]
pub struct NotificationFanout {
    preferences: Arc<dyn PreferenceStore>,
    notifications: Arc<dyn NotificationStore>,
    email: Arc<dyn EmailRelay>,
}

impl NotificationFanout {
    pub fn new(
        preferences: Arc<dyn PreferenceStore>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            preferences,
            notifications,
            email: Arc::new(LogEmailRelay),
        }
    }

    pub fn with_email_relay(mut self, relay: Arc<dyn EmailRelay>) -> Self {
        self.email = relay;
        self
    }

    /// Effective preferences for `user_id`. A missing record, or one that
    /// cannot be read right now, resolves to everything enabled.
    pub fn resolve_preferences(&self, user_id: Uuid) -> PreferenceSet {
        match self.preferences.load_preferences(user_id) {
            Ok(Some(prefs)) => prefs,
            Ok(None) => PreferenceSet::default(),
            Err(e) => {
                warn!("Preference lookup for {} failed, using defaults: {}", user_id, e);
                PreferenceSet::default()
            }
        }
    }

    pub fn notify(&self, event: &DomainEvent, recipient: Uuid) -> Result<Option<Notification>> {
        let kind = event.kind();
        let prefs = self.resolve_preferences(recipient);

        if !prefs.allows(kind) {
            debug!("Fan-out skipped: {} has {} notifications off", recipient, kind.as_str());
            return Ok(None);
        }

        let rendered = render(event);
        let notification = self.notifications.append_notification(&Notification {
            id: Uuid::new_v4(),
            user_id: recipient,
            kind,
            title: rendered.title,
            content: rendered.content,
            is_read: false,
            created_at: Utc::now(),
            action_url: rendered.action_url,
            metadata: Some(rendered.metadata),
        })?;

        if prefs.email {
            if let Err(e) = self.email.relay(&notification) {
                warn!("Email relay failed for notification {}: {}", notification.id, e);
            }
        }

        Ok(Some(notification))
    }
}
