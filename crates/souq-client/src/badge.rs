use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use souq_types::api::NotificationListResponse;
use souq_types::models::Notification;

use crate::http::{ClientError, SouqClient};

/// Unread notifications in `notifications`.
pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.is_read).count()
}

/// What the notification bell renders.
///
/// The count is always derived from the held list. The only server figure
/// kept is the unread total beyond the capped preview, replaced on each poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Badge {
    /// Newest first.
    pub notifications: Vec<Notification>,
    unread_elsewhere: u64,
}

impl Badge {
    pub fn from_response(resp: NotificationListResponse) -> Self {
        let held = unread_count(&resp.notifications) as u64;
        Self {
            unread_elsewhere: resp.unread_count.saturating_sub(held),
            notifications: resp.notifications,
        }
    }

    pub fn unread(&self) -> u64 {
        unread_count(&self.notifications) as u64 + self.unread_elsewhere
    }

    /// A `new_notification` push.
    pub fn push(&mut self, notification: Notification) {
        if self.notifications.iter().any(|n| n.id == notification.id) {
            return;
        }
        self.notifications.insert(0, notification);
    }

    /// Optimistic local read; the server call is the caller's.
    pub fn mark_read(&mut self, id: Uuid) {
        if let Some(n) = self.notifications.iter_mut().find(|n| n.id == id) {
            n.is_read = true;
        }
    }

    pub fn mark_all_read(&mut self) {
        for n in &mut self.notifications {
            n.is_read = true;
        }
        self.unread_elsewhere = 0;
    }
}

/// Anything that can produce the notification preview.
pub trait NotificationSource: Send + Sync + 'static {
    fn preview(&self) -> impl Future<Output = Result<NotificationListResponse, ClientError>> + Send;
}

impl NotificationSource for SouqClient {
    fn preview(&self) -> impl Future<Output = Result<NotificationListResponse, ClientError>> + Send {
        self.notification_preview()
    }
}

/// Periodically refreshes the badge until cancelled.
pub struct BadgePoller {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl BadgePoller {
    pub fn spawn<S: NotificationSource>(source: S, every: Duration) -> (Self, watch::Receiver<Badge>) {
        let (tx, rx) = watch::channel(Badge::default());
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    _ = token.cancelled() => break,
                    result = source.preview() => match result {
                        Ok(resp) => {
                            if tx.send(Badge::from_response(resp)).is_err() {
                                debug!("Badge receiver dropped, stopping poller");
                                break;
                            }
                        }
                        // Keep the last good badge and try again next tick.
                        Err(e) => warn!("Notification poll failed: {}", e),
                    },
                }
            }
        });

        (
            Self {
                cancel,
                task: Some(task),
            },
            rx,
        )
    }

    /// Stop polling and wait for the task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for BadgePoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use souq_types::models::NotificationKind;

    use super::*;

    fn notification(is_read: bool) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: NotificationKind::Offer,
            title: "New offer".into(),
            content: "Layla submitted an offer".into(),
            is_read,
            created_at: Utc::now(),
            action_url: None,
            metadata: None,
        }
    }

    #[derive(Clone)]
    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl NotificationSource for Counting {
        fn preview(&self) -> impl Future<Output = Result<NotificationListResponse, ClientError>> + Send {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as u64 + 1;
            async move {
                Ok(NotificationListResponse {
                    notifications: Vec::new(),
                    unread_count: n,
                })
            }
        }
    }

    #[test]
    fn unread_count_is_derived_from_list() {
        let list = vec![notification(false), notification(true), notification(false)];
        assert_eq!(unread_count(&list), 2);
        assert_eq!(unread_count(&[]), 0);
    }

    #[test]
    fn badge_tracks_pushes_and_reads() {
        let mut badge = Badge::default();
        let first = notification(false);
        badge.push(first.clone());
        badge.push(first.clone());
        badge.push(notification(false));
        assert_eq!(badge.unread(), 2);
        assert_eq!(badge.notifications.len(), 2);

        badge.mark_read(first.id);
        badge.mark_read(first.id);
        assert_eq!(badge.unread(), 1);
        assert_eq!(badge.unread(), unread_count(&badge.notifications) as u64);
        badge.mark_all_read();
        assert_eq!(badge.unread(), 0);
    }

    #[test]
    fn count_beyond_preview_comes_from_latest_poll() {
        let shown = vec![notification(false), notification(true)];
        let mut badge = Badge::from_response(NotificationListResponse {
            notifications: shown,
            unread_count: 4,
        });
        assert_eq!(badge.unread(), 4);

        let head = badge.notifications[0].id;
        badge.mark_read(head);
        assert_eq!(badge.unread(), 3);
        badge.push(notification(false));
        assert_eq!(badge.unread(), 4);

        let badge = Badge::from_response(NotificationListResponse {
            notifications: vec![notification(false)],
            unread_count: 1,
        });
        assert_eq!(badge.unread(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_refreshes_until_cancelled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Counting { calls: calls.clone() };
        let (poller, mut rx) = BadgePoller::spawn(source, Duration::from_secs(30));

        // First tick fires immediately.
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().unread(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        poller.shutdown().await;
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
