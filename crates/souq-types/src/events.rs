use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DeliveryStatus, Message, Notification, NotificationKind};

/// Domain events that may turn into a notification for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A chat message was accepted for the recipient
    NewMessage {
        message_id: Uuid,
        from_user_id: Uuid,
        sender_name: String,
        preview: String,
        project_id: Option<Uuid>,
    },

    /// A provider submitted an offer on the recipient's project
    NewOffer {
        offer_id: Uuid,
        project_id: Uuid,
        project_title: String,
        provider_name: String,
        price: Option<String>,
    },

    /// A project (or its agreement) moved to a new status
    ProjectStatusChanged {
        project_id: Uuid,
        project_title: String,
        status: String,
    },

    /// A payment was confirmed by the gateway
    PaymentConfirmed {
        payment_id: Uuid,
        project_id: Option<Uuid>,
        amount: String,
        currency: String,
    },

    /// Free-form platform announcement
    System {
        title: String,
        content: String,
        action_url: Option<String>,
    },
}

impl DomainEvent {
    /// Preference category that gates this event.
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::NewMessage { .. } => NotificationKind::Message,
            Self::NewOffer { .. } => NotificationKind::Offer,
            Self::ProjectStatusChanged { .. } => NotificationKind::Project,
            Self::PaymentConfirmed { .. } => NotificationKind::Payment,
            Self::System { .. } => NotificationKind::System,
        }
    }
}

/// Events pushed to connected clients over the realtime channel.
/// No other shapes cross this boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// A message moved to a new delivery stage
    DeliveryStatus {
        message_id: Uuid,
        delivery_status: DeliveryStatus,
    },

    /// A notification was persisted for this user
    NewNotification { notification: Notification },

    /// A message was persisted in one of this user's conversations
    NewMessage { message: Message },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// The recipient's client has received these messages
    Ack { message_ids: Vec<Uuid> },
}
