use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use souq_types::models::{DeliveryStatus, Message, MessageDraft, MessageId, Notification, PreferenceSet};
use souq_types::store::{MessageStore, NotificationStore, PreferenceStore, ReadOutcome};

use crate::Database;
use crate::models::{MessageRow, NotificationRow, format_timestamp};

const MESSAGE_COLUMNS: &str =
    "id, from_user_id, to_user_id, project_id, content, created_at, is_read, delivery_status";

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, content, is_read, created_at, action_url, metadata";

// -- Messages --

impl MessageStore for Database {
    fn load_conversation(&self, viewer: Uuid, peer: Uuid, limit: u32) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            // Newest `limit` rows, flipped back to ascending order
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE (from_user_id = ?1 AND to_user_id = ?2)
                    OR (from_user_id = ?2 AND to_user_id = ?1)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3"
            ))?;

            let mut rows = stmt
                .query_map(
                    rusqlite::params![viewer.to_string(), peer.to_string(), limit],
                    message_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();

            Ok(rows.into_iter().map(Message::from).collect())
        })
    }

    fn append_message(&self, draft: &MessageDraft) -> Result<Message> {
        let message = Message {
            id: MessageId::Permanent(Uuid::new_v4()),
            from_user_id: draft.from_user_id,
            to_user_id: draft.to_user_id,
            project_id: draft.project_id,
            content: draft.content.clone(),
            created_at: Utc::now(),
            read: false,
            delivery_status: DeliveryStatus::Sent,
            client_ref: draft.client_ref,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, from_user_id, to_user_id, project_id, content, created_at, is_read, delivery_status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
                rusqlite::params![
                    message.id.to_string(),
                    message.from_user_id.to_string(),
                    message.to_user_id.to_string(),
                    message.project_id.map(|p| p.to_string()),
                    message.content,
                    format_timestamp(&message.created_at),
                    message.delivery_status.as_str(),
                ],
            )?;
            Ok(())
        })?;

        Ok(message)
    }

    fn mark_delivered(&self, recipient: Uuid, ids: &[Uuid]) -> Result<Vec<Message>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let recipient = recipient.to_string();
            let mut changed = Vec::new();

            for id in ids {
                let id = id.to_string();
                // Only sent -> delivered; processing never reaches the server and
                // failed/delivered are terminal.
                let updated = tx.execute(
                    "UPDATE messages SET delivery_status = 'delivered'
                     WHERE id = ?1 AND to_user_id = ?2 AND delivery_status = 'sent'",
                    (&id, &recipient),
                )?;
                if updated == 1 {
                    let row = tx.query_row(
                        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                        [&id],
                        message_row,
                    )?;
                    changed.push(Message::from(row));
                }
            }

            tx.commit()?;
            Ok(changed)
        })
    }

    fn mark_conversation_read(&self, viewer: Uuid, peer: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE to_user_id = ?1 AND from_user_id = ?2 AND is_read = 0",
                (viewer.to_string(), peer.to_string()),
            )?;
            Ok(updated)
        })
    }
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        from_user_id: row.get(1)?,
        to_user_id: row.get(2)?,
        project_id: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
        is_read: row.get(6)?,
        delivery_status: row.get(7)?,
    })
}

// -- Notifications --

impl NotificationStore for Database {
    fn append_notification(&self, notification: &Notification) -> Result<Notification> {
        let metadata = notification
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO notifications ({NOTIFICATION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                rusqlite::params![
                    notification.id.to_string(),
                    notification.user_id.to_string(),
                    notification.kind.as_str(),
                    notification.title,
                    notification.content,
                    notification.is_read,
                    format_timestamp(&notification.created_at),
                    notification.action_url,
                    metadata,
                ],
            )?;
            Ok(())
        })?;

        Ok(notification.clone())
    }

    fn list_notifications(&self, user_id: Uuid, limit: u32) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE user_id = ?1
                 ORDER BY seq DESC
                 LIMIT ?2"
            ))?;

            let rows = stmt
                .query_map(rusqlite::params![user_id.to_string(), limit], notification_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows.into_iter().map(Notification::from).collect())
        })
    }

    fn unread_count(&self, user_id: Uuid) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
                [user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<ReadOutcome> {
        self.with_conn(|conn| {
            let (id, user_id) = (id.to_string(), user_id.to_string());
            let updated = conn.execute(
                "UPDATE notifications SET is_read = 1
                 WHERE id = ?1 AND user_id = ?2 AND is_read = 0",
                (&id, &user_id),
            )?;
            if updated == 1 {
                return Ok(ReadOutcome::Marked);
            }

            let exists: Option<i64> = conn
                .query_row(
                    "SELECT seq FROM notifications WHERE id = ?1 AND user_id = ?2",
                    (&id, &user_id),
                    |row| row.get(0),
                )
                .optional()?;

            Ok(match exists {
                Some(_) => ReadOutcome::AlreadyRead,
                None => ReadOutcome::NotFound,
            })
        })
    }

    fn mark_all_read(&self, user_id: Uuid, up_to: Option<Uuid>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let user_id = user_id.to_string();

            // Fix the upper bound before touching anything: notifications that
            // land after this point keep their unread state.
            let bound: Option<i64> = match up_to {
                Some(id) => tx
                    .query_row(
                        "SELECT seq FROM notifications WHERE id = ?1 AND user_id = ?2",
                        (id.to_string(), &user_id),
                        |row| row.get(0),
                    )
                    .optional()?,
                None => tx.query_row(
                    "SELECT MAX(seq) FROM notifications WHERE user_id = ?1",
                    [&user_id],
                    |row| row.get(0),
                )?,
            };

            let Some(bound) = bound else {
                return Ok(0);
            };

            let updated = tx.execute(
                "UPDATE notifications SET is_read = 1
                 WHERE user_id = ?1 AND is_read = 0 AND seq <= ?2",
                (&user_id, bound),
            )?;

            tx.commit()?;
            Ok(updated)
        })
    }
}

fn notification_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        is_read: row.get(5)?,
        created_at: row.get(6)?,
        action_url: row.get(7)?,
        metadata: row.get(8)?,
    })
}

// -- Preferences --

impl PreferenceStore for Database {
    fn load_preferences(&self, user_id: Uuid) -> Result<Option<PreferenceSet>> {
        self.with_conn(|conn| query_preferences(conn, user_id))
    }

    fn save_preferences(&self, user_id: Uuid, prefs: &PreferenceSet) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notification_preferences
                    (user_id, message, offer, project, payment, system, email, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(user_id) DO UPDATE SET
                    message = excluded.message,
                    offer = excluded.offer,
                    project = excluded.project,
                    payment = excluded.payment,
                    system = excluded.system,
                    email = excluded.email,
                    updated_at = excluded.updated_at",
                rusqlite::params![
                    user_id.to_string(),
                    prefs.message,
                    prefs.offer,
                    prefs.project,
                    prefs.payment,
                    prefs.system,
                    prefs.email,
                    format_timestamp(&Utc::now()),
                ],
            )?;
            Ok(())
        })
    }
}

fn query_preferences(conn: &Connection, user_id: Uuid) -> Result<Option<PreferenceSet>> {
    let mut stmt = conn.prepare(
        "SELECT message, offer, project, payment, system, email
         FROM notification_preferences WHERE user_id = ?1",
    )?;

    let prefs = stmt
        .query_row([user_id.to_string()], |row| {
            Ok(PreferenceSet {
                message: row.get(0)?,
                offer: row.get(1)?,
                project: row.get(2)?,
                payment: row.get(3)?,
                system: row.get(4)?,
                email: row.get(5)?,
            })
        })
        .optional()?;

    Ok(prefs)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
