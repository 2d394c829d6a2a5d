use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use souq_types::models::{DeliveryStatus, Message, MessageId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackError {
    #[error("no pending message {0}")]
    Unknown(MessageId),

    #[error("illegal delivery transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },
}

/// Result of the server accepting a message the tracker was waiting on.
#[derive(Debug, Clone, PartialEq)]
pub enum Acceptance {
    /// The pending entry is gone; the confirmed message replaces it.
    Confirmed(Message),
    /// The entry had already failed. The confirmed copy stays hidden for the
    /// rest of the session.
    Suppressed,
}

/// Move `message` one step along its delivery lifecycle.
///
/// Returns `Ok(false)` when the message is already in `next` (duplicate
/// pushes are harmless).
pub fn advance(message: &mut Message, next: DeliveryStatus) -> Result<bool, TrackError> {
    if message.delivery_status == next {
        return Ok(false);
    }
    if !message.delivery_status.can_transition_to(next) {
        return Err(TrackError::IllegalTransition {
            from: message.delivery_status,
            to: next,
        });
    }
    message.delivery_status = next;
    Ok(true)
}

#[derive(Debug, Clone)]
struct Entry {
    message: Message,
    started_at: DateTime<Utc>,
}

/// Client-side holder of messages the viewer has sent but the server has not
/// yet confirmed.
///
/// Time is passed in by the caller so the timeout sweep is deterministic.
#[derive(Debug)]
pub struct DeliveryTracker {
    timeout: Duration,
    entries: Vec<Entry>,
    /// permanent id -> temp id of entries whose acceptance arrived after they
    /// had already failed.
    suppressed: HashMap<Uuid, MessageId>,
    /// Client refs of failed entries replaced by a retry.
    retired: HashSet<Uuid>,
}

impl DeliveryTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: Vec::new(),
            suppressed: HashMap::new(),
            retired: HashSet::new(),
        }
    }

    /// Record a new send attempt in `processing` under a fresh temporary id.
    pub fn begin(
        &mut self,
        from_user_id: Uuid,
        to_user_id: Uuid,
        project_id: Option<Uuid>,
        content: String,
        now: DateTime<Utc>,
    ) -> Message {
        let client_ref = Uuid::new_v4();
        let message = Message {
            id: MessageId::Temp(client_ref),
            from_user_id,
            to_user_id,
            project_id,
            content,
            created_at: now,
            read: false,
            delivery_status: DeliveryStatus::Processing,
            client_ref: Some(client_ref),
        };
        self.entries.push(Entry {
            message: message.clone(),
            started_at: now,
        });
        message
    }

    /// Durable acceptance by the server. Swaps the temporary entry for the
    /// confirmed message in one step.
    pub fn accepted(&mut self, temp_id: MessageId, confirmed: &Message) -> Result<Acceptance, TrackError> {
        if let MessageId::Temp(client_ref) = temp_id {
            if self.retired.contains(&client_ref) {
                self.suppress(temp_id, confirmed);
                return Ok(Acceptance::Suppressed);
            }
        }

        let idx = self.position(temp_id)?;
        let status = self.entries[idx].message.delivery_status;

        match status {
            DeliveryStatus::Processing => {
                self.entries.remove(idx);
                let mut message = confirmed.clone();
                if message.delivery_status == DeliveryStatus::Processing {
                    message.delivery_status = DeliveryStatus::Sent;
                }
                Ok(Acceptance::Confirmed(message))
            }
            DeliveryStatus::Failed => {
                self.suppress(temp_id, confirmed);
                Ok(Acceptance::Suppressed)
            }
            other => Err(TrackError::IllegalTransition {
                from: other,
                to: DeliveryStatus::Sent,
            }),
        }
    }

    /// Transport error on the send request.
    pub fn mark_failed(&mut self, temp_id: MessageId) -> Result<bool, TrackError> {
        let idx = self.position(temp_id)?;
        advance(&mut self.entries[idx].message, DeliveryStatus::Failed)
    }

    /// Fail every `processing` entry older than the timeout. Each entry fails
    /// at most once and is never resent.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<MessageId> {
        let mut expired = Vec::new();
        for entry in &mut self.entries {
            if entry.message.delivery_status == DeliveryStatus::Processing
                && now - entry.started_at >= self.timeout
            {
                entry.message.delivery_status = DeliveryStatus::Failed;
                expired.push(entry.message.id);
            }
        }
        if !expired.is_empty() {
            debug!("{} pending message(s) timed out", expired.len());
        }
        expired
    }

    /// Manual resend of a failed entry: the old entry is dropped and a new
    /// `processing` attempt starts under a new temporary id.
    pub fn retry(&mut self, temp_id: MessageId, now: DateTime<Utc>) -> Result<Message, TrackError> {
        let idx = self.position(temp_id)?;
        let status = self.entries[idx].message.delivery_status;
        if status != DeliveryStatus::Failed {
            return Err(TrackError::IllegalTransition {
                from: status,
                to: DeliveryStatus::Processing,
            });
        }
        let old = self.entries.remove(idx).message;
        if let Some(client_ref) = old.client_ref {
            self.retired.insert(client_ref);
        }
        Ok(self.begin(old.from_user_id, old.to_user_id, old.project_id, old.content, now))
    }

    /// A fresh server history is authoritative: failed entries whose late
    /// acceptance shows up in it are dropped, and their suppression lifted.
    pub fn settle<'a>(&mut self, confirmed: impl IntoIterator<Item = &'a Message>) {
        for message in confirmed {
            let Some(id) = message.id.permanent() else { continue };
            if let Some(temp_id) = self.suppressed.remove(&id) {
                self.entries.retain(|e| e.message.id != temp_id);
            }
        }
    }

    pub fn is_suppressed(&self, id: Uuid) -> bool {
        self.suppressed.contains_key(&id)
    }

    /// Match a pushed copy of one of our own sends to its pending entry by
    /// client ref. A push for an entry still `processing` counts as its
    /// acceptance; one for a failed or retried entry is suppressed. Returns
    /// `None` for sends this tracker does not own or has already settled.
    pub fn claim_echo(&mut self, echo: &Message) -> Option<Acceptance> {
        let client_ref = echo.client_ref?;
        let temp_id = MessageId::Temp(client_ref);
        if !self.retired.contains(&client_ref) {
            self.get(temp_id)?;
        }
        self.accepted(temp_id, echo).ok()
    }

    fn suppress(&mut self, temp_id: MessageId, confirmed: &Message) {
        if let Some(permanent) = confirmed.id.permanent() {
            info!("Late acceptance of {} suppressed as {}", temp_id, permanent);
            self.suppressed.insert(permanent, temp_id);
        }
    }

    pub fn get(&self, temp_id: MessageId) -> Option<&Message> {
        self.entries.iter().map(|e| &e.message).find(|m| m.id == temp_id)
    }

    /// Pending messages in send order.
    pub fn pending(&self) -> Vec<Message> {
        self.entries.iter().map(|e| e.message.clone()).collect()
    }

    fn position(&self, temp_id: MessageId) -> Result<usize, TrackError> {
        self.entries
            .iter()
            .position(|e| e.message.id == temp_id)
            .ok_or(TrackError::Unknown(temp_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn confirmed_copy(pending: &Message) -> Message {
        Message {
            id: MessageId::Permanent(Uuid::new_v4()),
            delivery_status: DeliveryStatus::Sent,
            ..pending.clone()
        }
    }

    #[test]
    fn only_legal_edges_advance() {
        let mut tracker = DeliveryTracker::new(Duration::seconds(15));
        let mut m = tracker.begin(Uuid::new_v4(), Uuid::new_v4(), None, "hi".into(), at(0));

        assert!(advance(&mut m, DeliveryStatus::Delivered).is_err());
        assert_eq!(advance(&mut m, DeliveryStatus::Sent), Ok(true));
        assert_eq!(advance(&mut m, DeliveryStatus::Sent), Ok(false));
        assert_eq!(advance(&mut m, DeliveryStatus::Delivered), Ok(true));
        assert_eq!(
            advance(&mut m, DeliveryStatus::Failed),
            Err(TrackError::IllegalTransition {
                from: DeliveryStatus::Delivered,
                to: DeliveryStatus::Failed,
            })
        );
    }

    #[test]
    fn acceptance_swaps_temp_for_permanent() {
        let mut tracker = DeliveryTracker::new(Duration::seconds(15));
        let pending = tracker.begin(Uuid::new_v4(), Uuid::new_v4(), None, "hello".into(), at(0));
        let server = confirmed_copy(&pending);

        match tracker.accepted(pending.id, &server).unwrap() {
            Acceptance::Confirmed(m) => {
                assert_eq!(m.id, server.id);
                assert_eq!(m.delivery_status, DeliveryStatus::Sent);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(tracker.pending().is_empty());
        assert_eq!(
            tracker.accepted(pending.id, &server),
            Err(TrackError::Unknown(pending.id))
        );
    }

    #[test]
    fn timeout_fails_exactly_once() {
        let mut tracker = DeliveryTracker::new(Duration::seconds(15));
        let pending = tracker.begin(Uuid::new_v4(), Uuid::new_v4(), None, "hello".into(), at(0));

        assert!(tracker.expire(at(14)).is_empty());
        assert_eq!(tracker.expire(at(15)), vec![pending.id]);
        assert!(tracker.expire(at(60)).is_empty());
        assert_eq!(tracker.get(pending.id).unwrap().delivery_status, DeliveryStatus::Failed);
        // Still exactly one entry: nothing was resent.
        assert_eq!(tracker.pending().len(), 1);
    }

    #[test]
    fn late_acceptance_is_suppressed_not_resurrected() {
        let mut tracker = DeliveryTracker::new(Duration::seconds(15));
        let pending = tracker.begin(Uuid::new_v4(), Uuid::new_v4(), None, "hello".into(), at(0));
        tracker.expire(at(20));

        let server = confirmed_copy(&pending);
        assert_eq!(tracker.accepted(pending.id, &server), Ok(Acceptance::Suppressed));
        assert_eq!(tracker.get(pending.id).unwrap().delivery_status, DeliveryStatus::Failed);
        assert!(tracker.is_suppressed(server.id.permanent().unwrap()));

        // A reload that contains the message clears the failed entry.
        tracker.settle([&server]);
        assert!(tracker.pending().is_empty());
        assert!(!tracker.is_suppressed(server.id.permanent().unwrap()));
    }

    #[test]
    fn retry_is_a_new_attempt() {
        let mut tracker = DeliveryTracker::new(Duration::seconds(15));
        let pending = tracker.begin(Uuid::new_v4(), Uuid::new_v4(), None, "hello".into(), at(0));
        assert!(tracker.retry(pending.id, at(1)).is_err());

        tracker.mark_failed(pending.id).unwrap();
        let again = tracker.retry(pending.id, at(30)).unwrap();
        assert_ne!(again.id, pending.id);
        assert_eq!(again.delivery_status, DeliveryStatus::Processing);
        assert_eq!(tracker.pending().len(), 1);
        assert!(tracker.expire(at(44)).is_empty());
    }

    #[test]
    fn echo_is_claimed_by_client_ref_only() {
        let mut tracker = DeliveryTracker::new(Duration::seconds(15));
        let pending = tracker.begin(Uuid::new_v4(), Uuid::new_v4(), None, "hello".into(), at(0));

        // Same recipient and body, sent from another tab.
        let other_tab = Message {
            client_ref: Some(Uuid::new_v4()),
            ..confirmed_copy(&pending)
        };
        assert_eq!(tracker.claim_echo(&other_tab), None);
        let untagged = Message {
            client_ref: None,
            ..confirmed_copy(&pending)
        };
        assert_eq!(tracker.claim_echo(&untagged), None);
        assert_eq!(tracker.pending().len(), 1);

        let ours = confirmed_copy(&pending);
        assert_eq!(tracker.claim_echo(&ours), Some(Acceptance::Confirmed(ours.clone())));
        assert!(tracker.pending().is_empty());
        assert_eq!(tracker.claim_echo(&ours), None);
    }

    #[test]
    fn echo_after_timeout_is_suppressed() {
        let mut tracker = DeliveryTracker::new(Duration::seconds(15));
        let pending = tracker.begin(Uuid::new_v4(), Uuid::new_v4(), None, "hello".into(), at(0));
        tracker.expire(at(20));

        let echo = confirmed_copy(&pending);
        assert_eq!(tracker.claim_echo(&echo), Some(Acceptance::Suppressed));
        assert!(tracker.is_suppressed(echo.id.permanent().unwrap()));
        assert_eq!(tracker.get(pending.id).unwrap().delivery_status, DeliveryStatus::Failed);
    }

    #[test]
    fn acceptance_of_retried_attempt_is_suppressed() {
        let mut tracker = DeliveryTracker::new(Duration::seconds(15));
        let first = tracker.begin(Uuid::new_v4(), Uuid::new_v4(), None, "hello".into(), at(0));
        tracker.mark_failed(first.id).unwrap();
        let second = tracker.retry(first.id, at(5)).unwrap();

        let late = confirmed_copy(&first);
        assert_eq!(tracker.claim_echo(&late), Some(Acceptance::Suppressed));
        assert_eq!(tracker.accepted(first.id, &late), Ok(Acceptance::Suppressed));
        assert_eq!(tracker.pending(), vec![second]);
    }
}
