use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use souq_types::models::{DeliveryStatus, Message, MessageId};

/// Merge server-confirmed history with the viewer's pending sends into the
/// single ordered list a conversation renders.
///
/// Pending entries addressed to anyone but `peer_id` are ignored. A message
/// id appears at most once; when the confirmed list carries duplicates the
/// copy furthest along its delivery lifecycle wins. The result is sorted by
/// creation time with the id as tie-break, so reconciling the output again
/// yields the same list.
pub fn reconcile(confirmed: &[Message], pending: &[Message], peer_id: Uuid) -> Vec<Message> {
    let mut by_id: HashMap<MessageId, Message> = HashMap::new();

    for message in confirmed.iter().filter(|m| m.involves(peer_id)) {
        match by_id.get_mut(&message.id) {
            Some(existing) if further_along(message.delivery_status, existing.delivery_status) => {
                *existing = message.clone();
            }
            Some(_) => {}
            None => {
                by_id.insert(message.id, message.clone());
            }
        }
    }

    for message in pending.iter().filter(|m| m.to_user_id == peer_id) {
        by_id.entry(message.id).or_insert_with(|| message.clone());
    }

    let mut merged: Vec<Message> = by_id.into_values().collect();
    merged.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    merged
}

fn further_along(candidate: DeliveryStatus, current: DeliveryStatus) -> bool {
    match (candidate.rank(), current.rank()) {
        (Some(c), Some(cur)) => c > cur,
        // Failed never displaces a confirmed status.
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayLabel {
    Today,
    Yesterday,
    Date(NaiveDate),
}

impl fmt::Display for DayLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Today => f.write_str("today"),
            Self::Yesterday => f.write_str("yesterday"),
            Self::Date(date) => write!(f, "{}", date.format("%A, %B %-d, %Y")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub label: DayLabel,
    pub messages: Vec<Message>,
}

/// Group an ordered message list into calendar-day buckets in the viewer's
/// time zone. Bucket order follows message order.
pub fn group_by_day<Tz: TimeZone>(messages: &[Message], tz: &Tz, now: DateTime<Utc>) -> Vec<DayBucket> {
    let today = now.with_timezone(tz).date_naive();
    let yesterday = today.pred_opt();

    let mut buckets: Vec<DayBucket> = Vec::new();
    for message in messages {
        let date = message.created_at.with_timezone(tz).date_naive();
        match buckets.last_mut() {
            Some(bucket) if bucket.date == date => bucket.messages.push(message.clone()),
            _ => {
                let label = if date == today {
                    DayLabel::Today
                } else if Some(date) == yesterday {
                    DayLabel::Yesterday
                } else {
                    DayLabel::Date(date)
                };
                buckets.push(DayBucket {
                    date,
                    label,
                    messages: vec![message.clone()],
                });
            }
        }
    }
    buckets
}

/// What a conversation screen should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Not fetched yet and nothing pending.
    Loading,
    /// Fetched, and there is nothing to show.
    Empty,
    Ready,
}

pub fn view_state(fetched: bool, items: &[Message]) -> ViewState {
    if !items.is_empty() {
        ViewState::Ready
    } else if fetched {
        ViewState::Empty
    } else {
        ViewState::Loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};

    fn msg(from: Uuid, to: Uuid, created_at: DateTime<Utc>, status: DeliveryStatus) -> Message {
        Message {
            id: MessageId::Permanent(Uuid::new_v4()),
            from_user_id: from,
            to_user_id: to,
            project_id: None,
            content: "text".into(),
            created_at,
            read: false,
            delivery_status: status,
            client_ref: None,
        }
    }

    fn base() -> DateTime<Utc> {
        "2026-03-10T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn merges_filters_and_sorts() {
        let (me, peer, other) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let older = msg(peer, me, base(), DeliveryStatus::Delivered);
        let newer = msg(me, peer, base() + Duration::minutes(5), DeliveryStatus::Sent);
        let mut pending_peer = msg(me, peer, base() + Duration::minutes(2), DeliveryStatus::Processing);
        pending_peer.id = MessageId::new_temp();
        let mut pending_other = msg(me, other, base(), DeliveryStatus::Processing);
        pending_other.id = MessageId::new_temp();

        let view = reconcile(
            &[newer.clone(), older.clone()],
            &[pending_other, pending_peer.clone()],
            peer,
        );
        assert_eq!(view, vec![older, pending_peer, newer]);
    }

    #[test]
    fn duplicate_confirmed_keeps_most_advanced_status() {
        let (me, peer) = (Uuid::new_v4(), Uuid::new_v4());
        let sent = msg(me, peer, base(), DeliveryStatus::Sent);
        let delivered = Message {
            delivery_status: DeliveryStatus::Delivered,
            ..sent.clone()
        };

        let view = reconcile(&[delivered.clone(), sent.clone()], &[], peer);
        assert_eq!(view, vec![delivered.clone()]);
        let view = reconcile(&[sent, delivered.clone()], &[], peer);
        assert_eq!(view, vec![delivered]);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let (me, peer) = (Uuid::new_v4(), Uuid::new_v4());
        let same_instant = base();
        let confirmed = vec![
            msg(me, peer, same_instant, DeliveryStatus::Sent),
            msg(peer, me, same_instant, DeliveryStatus::Delivered),
            msg(peer, me, base() - Duration::hours(1), DeliveryStatus::Sent),
        ];
        let mut pending = msg(me, peer, base() + Duration::seconds(1), DeliveryStatus::Processing);
        pending.id = MessageId::new_temp();

        let once = reconcile(&confirmed, &[pending.clone()], peer);
        let twice = reconcile(&once, &[pending], peer);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 4);
    }

    #[test]
    fn buckets_today_yesterday_and_full_date() {
        let (me, peer) = (Uuid::new_v4(), Uuid::new_v4());
        let now = base();
        let ten_days = msg(peer, me, now - Duration::days(10), DeliveryStatus::Delivered);
        let yesterday = msg(peer, me, now - Duration::days(1), DeliveryStatus::Delivered);
        let today_a = msg(me, peer, now - Duration::hours(2), DeliveryStatus::Sent);
        let today_b = msg(me, peer, now, DeliveryStatus::Sent);

        let list = [ten_days, yesterday, today_a, today_b];
        let buckets = group_by_day(&list, &Utc, now);

        let labels: Vec<String> = buckets.iter().map(|b| b.label.to_string()).collect();
        assert_eq!(labels, vec!["Saturday, February 28, 2026", "yesterday", "today"]);
        assert_eq!(buckets[2].messages.len(), 2);
    }

    #[test]
    fn buckets_follow_viewer_time_zone() {
        let (me, peer) = (Uuid::new_v4(), Uuid::new_v4());
        // 23:30 UTC on the 9th is already the 10th in Riyadh (UTC+3).
        let late = msg(peer, me, "2026-03-09T23:30:00Z".parse().unwrap(), DeliveryStatus::Delivered);
        let riyadh = FixedOffset::east_opt(3 * 3600).unwrap();

        let buckets = group_by_day(&[late.clone()], &riyadh, base());
        assert_eq!(buckets[0].label, DayLabel::Today);
        let buckets = group_by_day(&[late], &Utc, base());
        assert_eq!(buckets[0].label, DayLabel::Yesterday);
    }

    #[test]
    fn empty_is_distinct_from_loading() {
        assert_eq!(view_state(false, &[]), ViewState::Loading);
        assert_eq!(view_state(true, &[]), ViewState::Empty);
        let m = msg(Uuid::new_v4(), Uuid::new_v4(), base(), DeliveryStatus::Sent);
        assert_eq!(view_state(false, &[m]), ViewState::Ready);
    }
}
