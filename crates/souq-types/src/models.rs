use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Messages --

/// Identity of a chat message.
///
/// `Temp` ids are minted on the client for optimistic rendering and are never
/// persisted. `Permanent` ids are assigned by the server when it durably
/// accepts the message. On the wire a permanent id is a bare UUID string and
/// a temporary one carries a `temp:` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MessageId {
    Temp(Uuid),
    Permanent(Uuid),
}

const TEMP_PREFIX: &str = "temp:";

impl MessageId {
    pub fn new_temp() -> Self {
        Self::Temp(Uuid::new_v4())
    }

    pub fn is_temp(&self) -> bool {
        matches!(self, Self::Temp(_))
    }

    /// The server-assigned id, if this message has been confirmed.
    pub fn permanent(&self) -> Option<Uuid> {
        match self {
            Self::Permanent(id) => Some(*id),
            Self::Temp(_) => None,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temp(id) => write!(f, "{}{}", TEMP_PREFIX, id),
            Self::Permanent(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(TEMP_PREFIX) {
            Some(rest) => Ok(Self::Temp(rest.parse()?)),
            None => Ok(Self::Permanent(s.parse()?)),
        }
    }
}

impl TryFrom<String> for MessageId {
    type Error = uuid::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MessageId> for String {
    fn from(id: MessageId) -> Self {
        id.to_string()
    }
}

impl From<Uuid> for MessageId {
    fn from(id: Uuid) -> Self {
        Self::Permanent(id)
    }
}

/// Lifecycle stage of a single message on its way to the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Processing,
    Sent,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    /// The only legal edges: processing→sent, sent→delivered and
    /// {processing, sent}→failed.
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, next),
            (Processing, Sent) | (Sent, Delivered) | (Processing, Failed) | (Sent, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }

    /// Position along the happy path. `Failed` sits outside it.
    pub fn rank(self) -> Option<u8> {
        match self {
            Self::Processing => Some(0),
            Self::Sent => Some(1),
            Self::Delivered => Some(2),
            Self::Failed => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown delivery status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub project_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    pub delivery_status: DeliveryStatus,
    /// Sender-chosen nonce echoed back on pushes of this send so the sending
    /// client can match the push to its pending entry. Not persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<Uuid>,
}

impl Message {
    /// True if this message belongs to the conversation between the two users,
    /// in either direction.
    pub fn involves_pair(&self, a: Uuid, b: Uuid) -> bool {
        (self.from_user_id == a && self.to_user_id == b)
            || (self.from_user_id == b && self.to_user_id == a)
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.from_user_id == user_id || self.to_user_id == user_id
    }
}

/// A message as submitted for persistence, before the store assigns its id
/// and creation time.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub project_id: Option<Uuid>,
    pub content: String,
    pub client_ref: Option<Uuid>,
}

// -- Notifications --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Message,
    Offer,
    Project,
    Payment,
    System,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Offer => "offer",
            Self::Project => "project",
            Self::Payment => "payment",
            Self::System => "system",
        }
    }

    /// Icon tag the UI renders next to the notification.
    pub fn icon(self) -> &'static str {
        match self {
            Self::Message => "message-circle",
            Self::Offer => "briefcase",
            Self::Project => "folder",
            Self::Payment => "credit-card",
            Self::System => "bell",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(Self::Message),
            "offer" => Ok(Self::Offer),
            "project" => Ok(Self::Project),
            "payment" => Ok(Self::Payment),
            "system" => Ok(Self::System),
            other => Err(format!("unknown notification kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

// -- Preferences --

/// Per-user delivery toggles. A user without a stored record gets
/// `PreferenceSet::default()`, which enables everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceSet {
    pub message: bool,
    pub offer: bool,
    pub project: bool,
    pub payment: bool,
    pub system: bool,
    /// Master switch for the email channel.
    pub email: bool,
}

impl Default for PreferenceSet {
    fn default() -> Self {
        Self {
            message: true,
            offer: true,
            project: true,
            payment: true,
            system: true,
            email: true,
        }
    }
}

impl PreferenceSet {
    pub fn allows(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::Message => self.message,
            NotificationKind::Offer => self.offer,
            NotificationKind::Project => self.project,
            NotificationKind::Payment => self.payment,
            NotificationKind::System => self.system,
        }
    }

    pub fn set(&mut self, kind: NotificationKind, enabled: bool) {
        match kind {
            NotificationKind::Message => self.message = enabled,
            NotificationKind::Offer => self.offer = enabled,
            NotificationKind::Project => self.project = enabled,
            NotificationKind::Payment => self.payment = enabled,
            NotificationKind::System => self.system = enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_status_edges() {
        use DeliveryStatus::*;
        let all = [Processing, Sent, Delivered, Failed];
        let mut legal = Vec::new();
        for from in all {
            for to in all {
                if from.can_transition_to(to) {
                    legal.push((from, to));
                }
            }
        }
        assert_eq!(
            legal,
            vec![
                (Processing, Sent),
                (Processing, Failed),
                (Sent, Delivered),
                (Sent, Failed),
            ]
        );
        assert!(Failed.is_terminal());
        assert!(Delivered.is_terminal());
    }

    #[test]
    fn message_id_wire_format() {
        let raw = Uuid::new_v4();
        let permanent = MessageId::Permanent(raw);
        let json = serde_json::to_string(&permanent).unwrap();
        assert_eq!(json, format!("\"{}\"", raw));

        let temp: MessageId = format!("temp:{}", raw).parse().unwrap();
        assert_eq!(temp, MessageId::Temp(raw));
        assert!(temp.permanent().is_none());

        assert!("temp:not-a-uuid".parse::<MessageId>().is_err());
    }

    #[test]
    fn missing_preference_fields_default_to_enabled() {
        let prefs: PreferenceSet = serde_json::from_str(r#"{"offer": false}"#).unwrap();
        assert!(!prefs.allows(NotificationKind::Offer));
        assert!(prefs.allows(NotificationKind::Message));
        assert!(prefs.email);
    }

    #[test]
    fn notification_kind_serializes_as_type() {
        let n = Notification {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            kind: NotificationKind::Payment,
            title: "t".into(),
            content: "c".into(),
            is_read: false,
            created_at: Utc::now(),
            action_url: None,
            metadata: None,
        };
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["type"], "payment");
        assert!(value.get("action_url").is_none());
    }
}
