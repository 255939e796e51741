use chatify_core::conversation::Conversation;
use chatify_core::error::StorageError;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::database::{format_ts, parse_ts};

type ConversationRow = (String, String, String, String, String);

pub struct ConversationRepo {
    pool: SqlitePool,
}

impl ConversationRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, conversation: &Conversation) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO conversations (id, user_id, title, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&conversation.id)
        .bind(&conversation.user_id)
        .bind(&conversation.title)
        .bind(format_ts(&conversation.created_at))
        .bind(format_ts(&conversation.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Conversation, StorageError> {
        let row: ConversationRow = sqlx::query_as(
            "SELECT id, user_id, title, created_at, updated_at \
             FROM conversations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?
        .ok_or_else(|| StorageError::NotFound(format!("conversation {id}")))?;

        row_to_conversation(row)
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<Conversation>, StorageError> {
        let rows: Vec<ConversationRow> = sqlx::query_as(
            "SELECT id, user_id, title, created_at, updated_at \
             FROM conversations WHERE user_id = ? ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        rows.into_iter().map(row_to_conversation).collect()
    }

    pub async fn touch(&self, id: &str) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(format_ts(&Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        expect_one(result.rows_affected(), id)
    }

    pub async fn rename(&self, id: &str, title: &str) -> Result<(), StorageError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StorageError::InvalidTitle);
        }

        let result = sqlx::query("UPDATE conversations SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(format_ts(&Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        expect_one(result.rows_affected(), id)
    }

    /// Deletes the conversation; its messages go with it.
    pub async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        expect_one(result.rows_affected(), id)
    }
}

fn expect_one(rows_affected: u64, id: &str) -> Result<(), StorageError> {
    if rows_affected == 0 {
        return Err(StorageError::NotFound(format!("conversation {id}")));
    }
    Ok(())
}

fn row_to_conversation(row: ConversationRow) -> Result<Conversation, StorageError> {
    Ok(Conversation {
        id: row.0,
        user_id: row.1,
        title: row.2,
        created_at: parse_ts(&row.3)?,
        updated_at: parse_ts(&row.4)?,
    })
}
