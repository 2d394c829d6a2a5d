use std::sync::Arc;

use anyhow::Result;
use tracing::debug;
use uuid::Uuid;

use souq_types::events::GatewayEvent;
use souq_types::models::{DeliveryStatus, Message};
use souq_types::store::MessageStore;

use crate::dispatcher::Dispatcher;

/// Records that `recipient` has received `ids`, then tells each sender.
///
/// The store update happens first; a push is only sent for messages whose
/// `delivered` state is already durable. Returns the ids that changed.
pub async fn acknowledge(
    store: Arc<dyn MessageStore>,
    dispatcher: &Dispatcher,
    recipient: Uuid,
    ids: Vec<Uuid>,
) -> Result<Vec<Uuid>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let changed = tokio::task::spawn_blocking(move || store.mark_delivered(recipient, &ids)).await??;
    debug!("{} acknowledged {} message(s)", recipient, changed.len());

    announce_delivered(dispatcher, &changed).await;

    Ok(changed.iter().filter_map(|m| m.id.permanent()).collect())
}

/// Push `delivered` to the sender of each message.
pub async fn announce_delivered(dispatcher: &Dispatcher, messages: &[Message]) {
    for message in messages {
        let Some(message_id) = message.id.permanent() else {
            continue;
        };
        dispatcher
            .send_to_user(
                message.from_user_id,
                GatewayEvent::DeliveryStatus {
                    message_id,
                    delivery_status: DeliveryStatus::Delivered,
                },
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;
    use souq_types::models::{MessageDraft, MessageId};

    /// Holds one sent message and records the order of operations.
    struct OneMessage {
        message: Mutex<Message>,
    }

    impl MessageStore for OneMessage {
        fn load_conversation(&self, _: Uuid, _: Uuid, _: u32) -> Result<Vec<Message>> {
            Ok(vec![self.message.lock().unwrap().clone()])
        }

        fn append_message(&self, _: &MessageDraft) -> Result<Message> {
            unimplemented!()
        }

        fn mark_delivered(&self, recipient: Uuid, ids: &[Uuid]) -> Result<Vec<Message>> {
            let mut m = self.message.lock().unwrap();
            let matches = m.to_user_id == recipient
                && m.delivery_status == DeliveryStatus::Sent
                && ids.iter().any(|id| m.id.permanent() == Some(*id));
            if !matches {
                return Ok(vec![]);
            }
            m.delivery_status = DeliveryStatus::Delivered;
            Ok(vec![m.clone()])
        }

        fn mark_conversation_read(&self, _: Uuid, _: Uuid) -> Result<usize> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn ack_persists_then_notifies_sender_once() {
        let (sender, recipient, id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let store = Arc::new(OneMessage {
            message: Mutex::new(Message {
                id: MessageId::Permanent(id),
                from_user_id: sender,
                to_user_id: recipient,
                project_id: None,
                content: "hello".into(),
                created_at: Utc::now(),
                read: false,
                delivery_status: DeliveryStatus::Sent,
                client_ref: None,
            }),
        });
        let dispatcher = Dispatcher::new();
        let (_, mut sender_rx) = dispatcher.register(sender).await;

        let changed = acknowledge(store.clone(), &dispatcher, recipient, vec![id]).await.unwrap();
        assert_eq!(changed, vec![id]);
        assert_eq!(
            store.message.lock().unwrap().delivery_status,
            DeliveryStatus::Delivered
        );
        assert_eq!(
            sender_rx.recv().await,
            Some(GatewayEvent::DeliveryStatus {
                message_id: id,
                delivery_status: DeliveryStatus::Delivered,
            })
        );

        // Second ack is a no-op and pushes nothing
        let again = acknowledge(store, &dispatcher, recipient, vec![id]).await.unwrap();
        assert!(again.is_empty());
        assert!(sender_rx.try_recv().is_err());
    }
}
