//! User table operations.

use crate::models::User;
use crate::{parse_timestamp, Database};
use chrono::Utc;
use mentora_core::error::StorageError;
use sqlx::Row;

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, StorageError> {
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| StorageError::QueryFailed(format!("created_at column: {e}")))?;
    Ok(User {
        id: row
            .try_get("id")
            .map_err(|e| StorageError::QueryFailed(format!("id column: {e}")))?,
        username: row
            .try_get("username")
            .map_err(|e| StorageError::QueryFailed(format!("username column: {e}")))?,
        email: row
            .try_get("email")
            .map_err(|e| StorageError::QueryFailed(format!("email column: {e}")))?,
        full_name: row
            .try_get("full_name")
            .map_err(|e| StorageError::QueryFailed(format!("full_name column: {e}")))?,
        hashed_password: row
            .try_get("hashed_password")
            .map_err(|e| StorageError::QueryFailed(format!("hashed_password column: {e}")))?,
        is_active: row
            .try_get::<i64, _>("is_active")
            .map_err(|e| StorageError::QueryFailed(format!("is_active column: {e}")))?
            != 0,
        created_at: parse_timestamp(&created_at)?,
    })
}

impl Database {
    /// Insert a new user. The caller is expected to have checked
    /// username and email uniqueness first for a friendly error; the
    /// unique constraints still hold as the last line of defense.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        full_name: Option<&str>,
        hashed_password: &str,
    ) -> Result<User, StorageError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, full_name, hashed_password, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5)
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(full_name)
        .bind(hashed_password)
        .bind(&now)
        .execute(self.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::AlreadyExists(format!("user '{username}'"))
            }
            other => StorageError::QueryFailed(format!("insert user: {other}")),
        })?;

        self.get_user(result.last_insert_rowid()).await
    }

    pub async fn get_user(&self, id: i64) -> Result<User, StorageError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("get user: {e}")))?
            .ok_or(StorageError::NotFound {
                entity: "user",
                id: id.to_string(),
            })?;
        row_to_user(&row)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("get user by username: {e}")))?;
        row.as_ref().map(row_to_user).transpose()
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("get user by email: {e}")))?;
        row.as_ref().map(row_to_user).transpose()
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("delete user: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "user",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
