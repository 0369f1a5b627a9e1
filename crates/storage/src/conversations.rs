//! Conversation and message table operations.
//!
//! Appending a message also bumps the parent conversation's
//! `updated_at`, so conversation listings sort by recent activity.

use crate::models::{Conversation, StoredMessage};
use crate::{parse_timestamp, Database};
use chrono::Utc;
use mentora_core::error::StorageError;
use mentora_core::message::Role;
use sqlx::Row;

fn parse_role(raw: &str) -> Result<Role, StorageError> {
    match raw {
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        "system" => Ok(Role::System),
        other => Err(StorageError::QueryFailed(format!(
            "unknown message role '{other}'"
        ))),
    }
}

fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation, StorageError> {
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| StorageError::QueryFailed(format!("created_at column: {e}")))?;
    let updated_at: String = row
        .try_get("updated_at")
        .map_err(|e| StorageError::QueryFailed(format!("updated_at column: {e}")))?;
    Ok(Conversation {
        id: row
            .try_get("id")
            .map_err(|e| StorageError::QueryFailed(format!("id column: {e}")))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| StorageError::QueryFailed(format!("user_id column: {e}")))?,
        title: row
            .try_get("title")
            .map_err(|e| StorageError::QueryFailed(format!("title column: {e}")))?,
        lesson_id: row
            .try_get("lesson_id")
            .map_err(|e| StorageError::QueryFailed(format!("lesson_id column: {e}")))?,
        template_name: row
            .try_get("template_name")
            .map_err(|e| StorageError::QueryFailed(format!("template_name column: {e}")))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<StoredMessage, StorageError> {
    let role: String = row
        .try_get("role")
        .map_err(|e| StorageError::QueryFailed(format!("role column: {e}")))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| StorageError::QueryFailed(format!("created_at column: {e}")))?;
    Ok(StoredMessage {
        id: row
            .try_get("id")
            .map_err(|e| StorageError::QueryFailed(format!("id column: {e}")))?,
        conversation_id: row
            .try_get("conversation_id")
            .map_err(|e| StorageError::QueryFailed(format!("conversation_id column: {e}")))?,
        role: parse_role(&role)?,
        content: row
            .try_get("content")
            .map_err(|e| StorageError::QueryFailed(format!("content column: {e}")))?,
        created_at: parse_timestamp(&created_at)?,
    })
}

impl Database {
    pub async fn create_conversation(
        &self,
        user_id: i64,
        title: &str,
        lesson_id: Option<i64>,
        template_name: &str,
    ) -> Result<Conversation, StorageError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO conversations (user_id, title, lesson_id, template_name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(lesson_id)
        .bind(template_name)
        .bind(&now)
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::QueryFailed(format!("insert conversation: {e}")))?;

        self.get_conversation(result.last_insert_rowid()).await
    }

    pub async fn get_conversation(&self, id: i64) -> Result<Conversation, StorageError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("get conversation: {e}")))?
            .ok_or(StorageError::NotFound {
                entity: "conversation",
                id: id.to_string(),
            })?;
        row_to_conversation(&row)
    }

    /// A user's conversations, most recently active first.
    pub async fn list_conversations(&self, user_id: i64) -> Result<Vec<Conversation>, StorageError> {
        let rows =
            sqlx::query("SELECT * FROM conversations WHERE user_id = ?1 ORDER BY updated_at DESC")
                .bind(user_id)
                .fetch_all(self.pool())
                .await
                .map_err(|e| StorageError::QueryFailed(format!("list conversations: {e}")))?;
        rows.iter().map(row_to_conversation).collect()
    }

    pub async fn rename_conversation(
        &self,
        id: i64,
        title: &str,
    ) -> Result<Conversation, StorageError> {
        let now = Utc::now().to_rfc3339();
        let result =
            sqlx::query("UPDATE conversations SET title = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(title)
                .bind(&now)
                .bind(id)
                .execute(self.pool())
                .await
                .map_err(|e| StorageError::QueryFailed(format!("rename conversation: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "conversation",
                id: id.to_string(),
            });
        }
        self.get_conversation(id).await
    }

    pub async fn delete_conversation(&self, id: i64) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("delete conversation: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "conversation",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Append a message and bump the conversation's `updated_at`.
    pub async fn add_message(
        &self,
        conversation_id: i64,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage, StorageError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO messages (conversation_id, role, content, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(conversation_id)
        .bind(role.as_str())
        .bind(content)
        .bind(&now)
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::QueryFailed(format!("insert message: {e}")))?;

        sqlx::query("UPDATE conversations SET updated_at = ?1 WHERE id = ?2")
            .bind(&now)
            .bind(conversation_id)
            .execute(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("touch conversation: {e}")))?;

        let row = sqlx::query("SELECT * FROM messages WHERE id = ?1")
            .bind(result.last_insert_rowid())
            .fetch_one(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("fetch message: {e}")))?;
        row_to_message(&row)
    }

    /// All messages of a conversation in insertion order.
    pub async fn get_messages(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<StoredMessage>, StorageError> {
        let rows = sqlx::query("SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY id ASC")
            .bind(conversation_id)
            .fetch_all(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("get messages: {e}")))?;
        rows.iter().map(row_to_message).collect()
    }
}
