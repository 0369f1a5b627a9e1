//! Token table operations.
//!
//! Issued bearer tokens are persisted so that logout can revoke them
//! before their natural expiry. Validation checks both the expiry
//! timestamp and the revocation flag.

use crate::models::ApiToken;
use crate::{parse_timestamp, Database};
use chrono::{DateTime, Utc};
use mentora_core::error::StorageError;
use sqlx::Row;

fn row_to_token(row: &sqlx::sqlite::SqliteRow) -> Result<ApiToken, StorageError> {
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| StorageError::QueryFailed(format!("created_at column: {e}")))?;
    let expires_at: String = row
        .try_get("expires_at")
        .map_err(|e| StorageError::QueryFailed(format!("expires_at column: {e}")))?;
    Ok(ApiToken {
        id: row
            .try_get("id")
            .map_err(|e| StorageError::QueryFailed(format!("id column: {e}")))?,
        token: row
            .try_get("token")
            .map_err(|e| StorageError::QueryFailed(format!("token column: {e}")))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| StorageError::QueryFailed(format!("user_id column: {e}")))?,
        created_at: parse_timestamp(&created_at)?,
        expires_at: parse_timestamp(&expires_at)?,
        revoked: row
            .try_get::<i64, _>("revoked")
            .map_err(|e| StorageError::QueryFailed(format!("revoked column: {e}")))?
            != 0,
    })
}

impl Database {
    /// Record an issued token for `user_id`.
    pub async fn store_token(
        &self,
        token: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<ApiToken, StorageError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO tokens (token, user_id, created_at, expires_at, revoked)
            VALUES (?1, ?2, ?3, ?4, 0)
            "#,
        )
        .bind(token)
        .bind(user_id)
        .bind(&now)
        .bind(expires_at.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::QueryFailed(format!("insert token: {e}")))?;

        let row = sqlx::query("SELECT * FROM tokens WHERE id = ?1")
            .bind(result.last_insert_rowid())
            .fetch_one(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("fetch token: {e}")))?;
        row_to_token(&row)
    }

    /// Fetch a token record by its opaque value.
    pub async fn get_token(&self, token: &str) -> Result<Option<ApiToken>, StorageError> {
        let row = sqlx::query("SELECT * FROM tokens WHERE token = ?1")
            .bind(token)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("get token: {e}")))?;
        row.as_ref().map(row_to_token).transpose()
    }

    /// Mark a token revoked. Revoking an unknown token is a no-op.
    pub async fn revoke_token(&self, token: &str) -> Result<(), StorageError> {
        sqlx::query("UPDATE tokens SET revoked = 1 WHERE token = ?1")
            .bind(token)
            .execute(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("revoke token: {e}")))?;
        Ok(())
    }

    /// Delete expired and revoked tokens. Returns the number removed.
    pub async fn prune_tokens(&self) -> Result<u64, StorageError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query("DELETE FROM tokens WHERE revoked = 1 OR expires_at <= ?1")
            .bind(&now)
            .execute(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("prune tokens: {e}")))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_db, seed_user};
    use chrono::Duration;

    #[tokio::test]
    async fn stored_token_is_valid_until_revoked() {
        let db = memory_db().await;
        let user = seed_user(&db, "alice").await;
        let expires = Utc::now() + Duration::hours(24);

        db.store_token("tok-1", user.id, expires).await.unwrap();
        let token = db.get_token("tok-1").await.unwrap().unwrap();
        assert!(token.is_valid_at(Utc::now()));
        assert_eq!(token.user_id, user.id);

        db.revoke_token("tok-1").await.unwrap();
        let token = db.get_token("tok-1").await.unwrap().unwrap();
        assert!(!token.is_valid_at(Utc::now()));
    }

    #[tokio::test]
    async fn expired_token_is_invalid() {
        let db = memory_db().await;
        let user = seed_user(&db, "bob").await;
        let expired = Utc::now() - Duration::minutes(1);

        db.store_token("tok-old", user.id, expired).await.unwrap();
        let token = db.get_token("tok-old").await.unwrap().unwrap();
        assert!(!token.is_valid_at(Utc::now()));
    }

    #[tokio::test]
    async fn prune_removes_expired_and_revoked() {
        let db = memory_db().await;
        let user = seed_user(&db, "carol").await;

        db.store_token("live", user.id, Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        db.store_token("dead", user.id, Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        db.store_token("revoked", user.id, Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        db.revoke_token("revoked").await.unwrap();

        assert_eq!(db.prune_tokens().await.unwrap(), 2);
        assert!(db.get_token("live").await.unwrap().is_some());
        assert!(db.get_token("dead").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_token_lookup_is_none() {
        let db = memory_db().await;
        assert!(db.get_token("nope").await.unwrap().is_none());
    }
}
