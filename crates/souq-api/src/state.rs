use std::sync::Arc;

use souq_db::Database;
use souq_gateway::dispatcher::Dispatcher;
use souq_notify::NotificationFanout;
use souq_types::store::MessageStore;

pub type AppState = Arc<AppStateInner>;

/// Caps applied to list endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub notification_preview: u32,
    pub notification_max: u32,
    pub conversation: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            notification_preview: 5,
            notification_max: 200,
            conversation: 500,
        }
    }
}

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
    pub fanout: NotificationFanout,
    pub jwt_secret: String,
    /// Shared secret for `/internal/events`; the endpoint rejects everything
    /// when unset.
    pub internal_token: Option<String>,
    pub limits: Limits,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher, jwt_secret: String) -> Self {
        let fanout = NotificationFanout::new(db.clone(), db.clone());
        Self {
            db,
            dispatcher,
            fanout,
            jwt_secret,
            internal_token: None,
            limits: Limits::default(),
        }
    }

    pub fn message_store(&self) -> Arc<dyn MessageStore> {
        self.db.clone()
    }
}
