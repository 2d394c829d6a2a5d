use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::DomainEvent;
use crate::models::{Notification, NotificationKind, PreferenceSet};

// -- JWT Claims --

/// JWT claims shared by souq-api (REST middleware) and the gateway upgrade.
/// Tokens are issued by the platform's auth service; this core only verifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

// -- Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub to_user_id: Uuid,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    pub content: String,
    /// Echoed on the resulting `new_message` pushes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AckRequest {
    pub message_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    /// Ids that moved from `sent` to `delivered` because of this ack.
    pub delivered: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatedResponse {
    pub updated: usize,
}

// -- Notifications --

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationView {
    /// Short list for the header dropdown
    #[default]
    Preview,
    /// Dedicated notifications page
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkAllReadRequest {
    /// Newest notification the client has seen. Anything created after it is
    /// left unread.
    #[serde(default)]
    pub up_to: Option<Uuid>,
}

// -- Preferences --

/// Partial preference update. Omitted toggles keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreferenceUpdate {
    pub message: Option<bool>,
    pub offer: Option<bool>,
    pub project: Option<bool>,
    pub payment: Option<bool>,
    pub system: Option<bool>,
    pub email: Option<bool>,
}

impl PreferenceUpdate {
    pub fn apply_to(&self, prefs: &mut PreferenceSet) {
        let toggles = [
            (NotificationKind::Message, self.message),
            (NotificationKind::Offer, self.offer),
            (NotificationKind::Project, self.project),
            (NotificationKind::Payment, self.payment),
            (NotificationKind::System, self.system),
        ];
        for (kind, value) in toggles {
            if let Some(enabled) = value {
                prefs.set(kind, enabled);
            }
        }
        if let Some(email) = self.email {
            prefs.email = email;
        }
    }
}

// -- Moderation --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModerationCheckRequest {
    /// Field name -> user-authored text, e.g. an offer's description and duration.
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationCheckResponse {
    pub allowed: bool,
    /// Field name -> rejection code, only for rejected fields.
    pub violations: BTreeMap<String, String>,
}

// -- Internal event intake --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventIntakeRequest {
    pub recipient_id: Uuid,
    pub event: DomainEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventIntakeResponse {
    /// `None` when the recipient has this category switched off.
    pub notification: Option<Notification>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_update_keeps_other_toggles() {
        let mut prefs = PreferenceSet::default();
        let update = PreferenceUpdate {
            offer: Some(false),
            email: Some(false),
            ..Default::default()
        };
        update.apply_to(&mut prefs);
        assert!(!prefs.offer);
        assert!(!prefs.email);
        assert!(prefs.message && prefs.project && prefs.payment && prefs.system);
    }

    #[test]
    fn send_request_rejects_unknown_fields() {
        let raw = r#"{"to_user_id":"00000000-0000-0000-0000-000000000001","content":"hi","id":"x"}"#;
        assert!(serde_json::from_str::<SendMessageRequest>(raw).is_err());
    }
}
