//! Message Repository Implementation
//!
//! SQLite implementation of `MessageStore`. Delivery-state updates are
//! computed in SQL so a row can only move forward (`sent` → `delivered` →
//! `read`), regardless of the order in which acknowledgements arrive.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::{DeliveryState, Message, MessageKind, MessageStore};
use crate::shared::error::StoreError;

/// SQLite message store.
#[derive(Clone)]
pub struct SqliteMessageRepository {
    pool: SqlitePool,
}

impl SqliteMessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for message queries.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: String,
    from_id: String,
    to_id: String,
    content: String,
    timestamp: DateTime<Utc>,
    delivered: bool,
    read_status: bool,
    status: String,
}

impl MessageRow {
    fn into_message(self) -> Message {
        // Flags and status are written together; if they ever disagree the
        // further-along one wins.
        let from_flags = DeliveryState::from_flags(self.delivered, self.read_status);
        let state = DeliveryState::parse(&self.status)
            .map(|s| s.advance(from_flags))
            .unwrap_or(from_flags);

        Message {
            kind: MessageKind::from_content(&self.id, &self.content),
            id: self.id,
            sender_id: self.from_id,
            recipient_id: self.to_id,
            timestamp: self.timestamp,
            state,
        }
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, from_id, to_id, content, timestamp, delivered, read_status, status FROM messages";

#[async_trait]
impl MessageStore for SqliteMessageRepository {
    async fn insert(&self, message: &Message) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, from_id, to_id, content, timestamp, delivered, read_status, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.recipient_id)
        .bind(message.content())
        .bind(message.timestamp)
        .bind(message.state.is_delivered())
        .bind(message.state.is_read())
        .bind(message.state.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_delivery_state(
        &self,
        message_id: &str,
        state: DeliveryState,
    ) -> Result<bool, StoreError> {
        let delivered = state.is_delivered();
        let read = state.is_read();

        let result = sqlx::query(
            r#"
            UPDATE messages
            SET delivered = MAX(delivered, ?),
                read_status = MAX(read_status, ?),
                status = CASE
                    WHEN MAX(read_status, ?) = 1 THEN 'read'
                    WHEN MAX(delivered, ?) = 1 THEN 'delivered'
                    ELSE 'sent'
                END
            WHERE id = ?
            "#,
        )
        .bind(delivered)
        .bind(read)
        .bind(read)
        .bind(delivered)
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_delivered(
        &self,
        recipient_id: &str,
        message_ids: &[String],
    ) -> Result<Vec<String>, StoreError> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut changed = Vec::with_capacity(message_ids.len());

        for message_id in message_ids {
            // Any error returns early and drops `tx`, rolling back every
            // row already touched.
            let result = sqlx::query(
                r#"
                UPDATE messages
                SET delivered = 1,
                    status = CASE WHEN read_status = 1 THEN 'read' ELSE 'delivered' END
                WHERE id = ? AND to_id = ? AND delivered = 0
                "#,
            )
            .bind(message_id)
            .bind(recipient_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                changed.push(message_id.clone());
            }
        }

        tx.commit().await?;
        Ok(changed)
    }

    async fn mark_all_delivered(&self, recipient_id: &str) -> Result<Vec<String>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM messages
            WHERE to_id = ? AND delivered = 0
            ORDER BY timestamp ASC, rowid ASC
            "#,
        )
        .bind(recipient_id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE messages
            SET delivered = 1,
                status = CASE WHEN read_status = 1 THEN 'read' ELSE 'delivered' END
            WHERE to_id = ? AND delivered = 0
            "#,
        )
        .bind(recipient_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ids)
    }

    async fn find_by_id(&self, message_id: &str) -> Result<Option<Message>, StoreError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(MessageRow::into_message))
    }

    async fn query_conversation(&self, user_id: &str) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "{} WHERE from_id = ? OR to_id = ? ORDER BY timestamp ASC, rowid ASC",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn query_undelivered(&self, recipient_id: &str) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "{} WHERE to_id = ? AND delivered = 0 ORDER BY timestamp ASC, rowid ASC",
            SELECT_COLUMNS
        ))
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn delete_conversation(&self, user_a: &str, user_b: &str) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            DELETE FROM messages
            WHERE (from_id = ? AND to_id = ?)
               OR (from_id = ? AND to_id = ?)
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .bind(user_b)
        .bind(user_a)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
