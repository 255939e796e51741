use chatify_core::error::StorageError;
use chatify_core::message::{Message, NewMessage};
use chrono::{Duration, SubsecRound, Utc};
use sqlx::SqlitePool;

use crate::database::{format_ts, parse_ts};

type MessageRow = (String, String, String, String, String, String);

pub struct MessageRepo {
    pool: SqlitePool,
}

impl MessageRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts `messages` in one transaction and returns the stored rows in
    /// submission order. Timestamps strictly increase within the batch.
    pub async fn append(
        &self,
        conversation_id: &str,
        user_id: &str,
        messages: &[NewMessage],
    ) -> Result<Vec<Message>, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let base = Utc::now().trunc_subsecs(6);
        let mut stored = Vec::with_capacity(messages.len());

        for (i, new) in messages.iter().enumerate() {
            let msg = Message {
                id: uuid::Uuid::new_v4().to_string(),
                conversation_id: conversation_id.to_string(),
                user_id: user_id.to_string(),
                role: new.role,
                content: new.content.clone(),
                created_at: base + Duration::microseconds(i as i64),
            };

            let result = sqlx::query(
                "INSERT INTO messages (id, conversation_id, user_id, role, content, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&msg.id)
            .bind(&msg.conversation_id)
            .bind(&msg.user_id)
            .bind(msg.role.as_str())
            .bind(&msg.content)
            .bind(format_ts(&msg.created_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

            if result.rows_affected() != 1 {
                return Err(StorageError::PartialWrite {
                    expected: messages.len(),
                    written: stored.len(),
                });
            }
            stored.push(msg);
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(stored)
    }

    pub async fn list(&self, conversation_id: &str) -> Result<Vec<Message>, StorageError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, conversation_id, user_id, role, content, created_at \
             FROM messages WHERE conversation_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        rows.into_iter().map(row_to_message).collect()
    }
}

fn row_to_message(row: MessageRow) -> Result<Message, StorageError> {
    Ok(Message {
        id: row.0,
        conversation_id: row.1,
        user_id: row.2,
        role: row.3.parse()?,
        content: row.4,
        created_at: parse_ts(&row.5)?,
    })
}
