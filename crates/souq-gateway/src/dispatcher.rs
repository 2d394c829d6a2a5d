use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::trace;
use uuid::Uuid;

use souq_types::events::GatewayEvent;

/// Routes realtime events to every live connection of a user.
///
/// Pushes are best-effort: a user with no live connection simply misses the
/// event and converges on the next fetch.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// user_id -> (conn_id -> sender). A user may be connected from several
    /// tabs or devices at once.
    connections: RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::UnboundedSender<GatewayEvent>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection for `user_id`. Returns (conn_id, receiver).
    pub async fn register(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .connections
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Drop one connection. Other connections of the same user stay registered.
    pub async fn unregister(&self, user_id: Uuid, conn_id: Uuid) {
        let mut connections = self.inner.connections.write().await;
        if let Some(user_conns) = connections.get_mut(&user_id) {
            user_conns.remove(&conn_id);
            if user_conns.is_empty() {
                connections.remove(&user_id);
            }
        }
    }

    /// Push an event to every live connection of `user_id`.
    /// Returns the number of connections it was handed to.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) -> usize {
        let connections = self.inner.connections.read().await;
        let Some(user_conns) = connections.get(&user_id) else {
            trace!("No live connection for {}, push dropped", user_id);
            return 0;
        };

        user_conns
            .values()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.connections.read().await.contains_key(&user_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner
            .connections
            .read()
            .await
            .values()
            .map(HashMap::len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use souq_types::models::DeliveryStatus;

    fn status_event() -> GatewayEvent {
        GatewayEvent::DeliveryStatus {
            message_id: Uuid::new_v4(),
            delivery_status: DeliveryStatus::Delivered,
        }
    }

    #[tokio::test]
    async fn pushes_reach_every_connection_of_the_user() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (_, mut tab_a) = dispatcher.register(user).await;
        let (_, mut tab_b) = dispatcher.register(user).await;
        let (_, mut other) = dispatcher.register(Uuid::new_v4()).await;

        let event = status_event();
        assert_eq!(dispatcher.send_to_user(user, event.clone()).await, 2);
        assert_eq!(tab_a.recv().await, Some(event.clone()));
        assert_eq!(tab_b.recv().await, Some(event));
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn offline_user_push_is_dropped() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.send_to_user(Uuid::new_v4(), status_event()).await, 0);
    }

    #[tokio::test]
    async fn unregister_only_removes_that_connection() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (first, _rx1) = dispatcher.register(user).await;
        let (second, _rx2) = dispatcher.register(user).await;

        dispatcher.unregister(user, first).await;
        assert!(dispatcher.is_online(user).await);
        assert_eq!(dispatcher.connection_count().await, 1);

        dispatcher.unregister(user, second).await;
        assert!(!dispatcher.is_online(user).await);
    }
}
