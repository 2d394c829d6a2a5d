/// Database row types: these map directly to SQLite rows.
/// Distinct from souq-types models to keep the DB layer independent.
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use tracing::warn;
use uuid::Uuid;

use souq_types::models::{DeliveryStatus, Message, MessageId, Notification, NotificationKind};

pub struct MessageRow {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub project_id: Option<String>,
    pub content: String,
    pub created_at: String,
    pub is_read: bool,
    pub delivery_status: String,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
    pub action_url: Option<String>,
    pub metadata: Option<String>,
}

/// Timestamps are stored as RFC 3339 with microseconds so that lexical order
/// matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str, row_id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by SQLite's datetime('now') have no timezone.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on row '{}': {}", raw, row_id, e);
            DateTime::default()
        })
}

fn parse_uuid(raw: &str, column: &str, row_id: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on row '{}': {}", column, raw, row_id, e);
        Uuid::default()
    })
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        let delivery_status = row.delivery_status.parse().unwrap_or_else(|e| {
            warn!("{} on message '{}'", e, row.id);
            DeliveryStatus::Sent
        });

        Message {
            id: MessageId::Permanent(parse_uuid(&row.id, "id", &row.id)),
            from_user_id: parse_uuid(&row.from_user_id, "from_user_id", &row.id),
            to_user_id: parse_uuid(&row.to_user_id, "to_user_id", &row.id),
            project_id: row
                .project_id
                .as_deref()
                .map(|p| parse_uuid(p, "project_id", &row.id)),
            created_at: parse_timestamp(&row.created_at, &row.id),
            content: row.content,
            read: row.is_read,
            delivery_status,
            client_ref: None,
        }
    }
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        let kind = row.kind.parse().unwrap_or_else(|e| {
            warn!("{} on notification '{}'", e, row.id);
            NotificationKind::System
        });
        let metadata = row.metadata.as_deref().and_then(|raw| {
            serde_json::from_str(raw)
                .map_err(|e| warn!("Corrupt metadata on notification '{}': {}", row.id, e))
                .ok()
        });

        Notification {
            id: parse_uuid(&row.id, "id", &row.id),
            user_id: parse_uuid(&row.user_id, "user_id", &row.id),
            kind,
            created_at: parse_timestamp(&row.created_at, &row.id),
            title: row.title,
            content: row.content,
            is_read: row.is_read,
            action_url: row.action_url,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_timestamps_sort_lexically() {
        let a = "2026-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let b = a + chrono::Duration::microseconds(1);
        assert!(format_timestamp(&a) < format_timestamp(&b));
        assert_eq!(parse_timestamp(&format_timestamp(&b), "x"), b);
    }

    #[test]
    fn legacy_sqlite_timestamps_parse_as_utc() {
        let ts = parse_timestamp("2026-03-01 10:00:00", "x");
        assert_eq!(format_timestamp(&ts), "2026-03-01T10:00:00.000000Z");
    }
}
