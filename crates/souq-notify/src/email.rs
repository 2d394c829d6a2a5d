use anyhow::Result;
use tracing::info;

use souq_types::models::Notification;

/// Secondary email channel, consulted after a notification is persisted and
/// only when the recipient's `email` toggle is on. Actual mail delivery lives
/// outside this core.
pub trait EmailRelay: Send + Sync {
    fn relay(&self, notification: &Notification) -> Result<()>;
}

/// Default relay: records the hand-off in the log.
pub struct LogEmailRelay;

impl EmailRelay for LogEmailRelay {
    fn relay(&self, notification: &Notification) -> Result<()> {
        info!(
            "Email queued for {} [{}]: {}",
            notification.user_id,
            notification.kind.as_str(),
            notification.title
        );
        Ok(())
    }
}
