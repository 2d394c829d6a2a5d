use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::debug;
use uuid::Uuid;

use souq_types::events::GatewayEvent;
use souq_types::models::{DeliveryStatus, Message, MessageId};

use crate::reconcile::{self, DayBucket, ViewState};
use crate::tracker::{Acceptance, DeliveryTracker, TrackError, advance};

/// Everything that can change a conversation screen.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Full history returned by the conversation endpoint.
    Fetched(Vec<Message>),
    /// Realtime push from the gateway.
    Push(GatewayEvent),
    /// The send request for `temp_id` came back with the stored message.
    Accepted { temp_id: MessageId, message: Message },
    /// The send request for `temp_id` failed in transport.
    SendFailed { temp_id: MessageId },
    /// Clock tick for the pending-send timeout sweep.
    Tick(DateTime<Utc>),
}

/// Side effects the caller should carry out after handling an event.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Effects {
    /// Messages addressed to the viewer that should be acknowledged.
    pub ack: Vec<Uuid>,
    /// Pending sends that just failed.
    pub failed: Vec<MessageId>,
}

/// One viewer's conversation with one peer: confirmed history from the
/// server plus the viewer's own pending sends.
#[derive(Debug)]
pub struct Conversation {
    viewer: Uuid,
    peer: Uuid,
    project_id: Option<Uuid>,
    confirmed: Vec<Message>,
    tracker: DeliveryTracker,
    fetched: bool,
}

impl Conversation {
    pub fn new(viewer: Uuid, peer: Uuid, send_timeout: Duration) -> Self {
        Self {
            viewer,
            peer,
            project_id: None,
            confirmed: Vec::new(),
            tracker: DeliveryTracker::new(send_timeout),
            fetched: false,
        }
    }

    /// Attach subsequent sends to a project thread.
    pub fn with_project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn peer(&self) -> Uuid {
        self.peer
    }

    /// Start a send. The returned `processing` message renders immediately.
    pub fn compose(&mut self, content: impl Into<String>, now: DateTime<Utc>) -> Message {
        self.tracker
            .begin(self.viewer, self.peer, self.project_id, content.into(), now)
    }

    /// Resend a failed message as a new attempt.
    pub fn retry(&mut self, temp_id: MessageId, now: DateTime<Utc>) -> Result<Message, TrackError> {
        self.tracker.retry(temp_id, now)
    }

    pub fn handle(&mut self, event: ClientEvent) -> Effects {
        let mut effects = Effects::default();

        match event {
            ClientEvent::Fetched(messages) => {
                self.tracker.settle(&messages);
                self.confirmed = messages
                    .into_iter()
                    .filter(|m| m.involves_pair(self.viewer, self.peer))
                    .collect();
                self.fetched = true;
            }
            ClientEvent::Push(GatewayEvent::NewMessage { message }) => {
                if !message.involves_pair(self.viewer, self.peer) {
                    return effects;
                }
                if let Some(id) = message.id.permanent() {
                    if self.tracker.is_suppressed(id) {
                        return effects;
                    }
                    // Echo of a send this session owns: it settles the
                    // pending entry, whichever of echo and response lands first.
                    if message.from_user_id == self.viewer {
                        match self.tracker.claim_echo(&message) {
                            Some(Acceptance::Confirmed(confirmed)) => {
                                self.upsert(confirmed);
                                return effects;
                            }
                            Some(Acceptance::Suppressed) => return effects,
                            None => {}
                        }
                    }
                    if message.to_user_id == self.viewer && message.delivery_status == DeliveryStatus::Sent {
                        effects.ack.push(id);
                    }
                }
                self.upsert(message);
            }
            ClientEvent::Push(GatewayEvent::DeliveryStatus {
                message_id,
                delivery_status,
            }) => {
                let target = MessageId::Permanent(message_id);
                if let Some(m) = self.confirmed.iter_mut().find(|m| m.id == target) {
                    if let Err(e) = advance(m, delivery_status) {
                        debug!("Ignoring status push for {}: {}", message_id, e);
                    }
                }
            }
            ClientEvent::Push(GatewayEvent::NewNotification { .. }) => {}
            ClientEvent::Accepted { temp_id, message } => match self.tracker.accepted(temp_id, &message) {
                Ok(Acceptance::Confirmed(message)) => self.upsert(message),
                Ok(Acceptance::Suppressed) => {}
                Err(e) => debug!("Acceptance for {} ignored: {}", temp_id, e),
            },
            ClientEvent::SendFailed { temp_id } => match self.tracker.mark_failed(temp_id) {
                Ok(true) => effects.failed.push(temp_id),
                Ok(false) => {}
                Err(e) => debug!("Failure for {} ignored: {}", temp_id, e),
            },
            ClientEvent::Tick(now) => effects.failed = self.tracker.expire(now),
        }

        effects
    }

    /// Ordered messages to render.
    pub fn messages(&self) -> Vec<Message> {
        reconcile::reconcile(&self.confirmed, &self.tracker.pending(), self.peer)
    }

    pub fn days<Tz: TimeZone>(&self, tz: &Tz, now: DateTime<Utc>) -> Vec<DayBucket> {
        reconcile::group_by_day(&self.messages(), tz, now)
    }

    pub fn view_state(&self) -> ViewState {
        reconcile::view_state(self.fetched, &self.messages())
    }

    fn upsert(&mut self, message: Message) {
        match self.confirmed.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => {
                let ahead = match (message.delivery_status.rank(), existing.delivery_status.rank()) {
                    (Some(new), Some(old)) => new > old,
                    _ => false,
                };
                if ahead {
                    *existing = message;
                }
            }
            None => self.confirmed.push(message),
        }
    }
}
