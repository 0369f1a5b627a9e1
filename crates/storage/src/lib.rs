//! SQLite persistence layer.
//!
//! One database file holds five tables: `users`, `tokens`, `lessons`,
//! `conversations`, and `messages`. All access goes through
//! [`Database`], a thin handle over a connection pool; the entity
//! operations live in per-table modules as `impl Database` blocks.
//!
//! Timestamps are stored as RFC 3339 text. Foreign keys are enforced;
//! deleting a user cascades to their tokens and conversations, and
//! deleting a conversation cascades to its messages.

pub mod conversations;
pub mod lessons;
pub mod models;
pub mod tokens;
pub mod users;

use mentora_core::error::StorageError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info};

pub use models::{ApiToken, Conversation, StoredMessage, User};

/// Handle to the Mentora database.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (and create if missing) the database at `path`.
    ///
    /// Pass `":memory:"` for an in-process ephemeral database, which
    /// the tests use throughout.
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StorageError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Storage(format!("Failed to open SQLite: {e}")))?;

        let db = Self { pool };
        db.run_migrations().await?;
        info!("Database initialized at {path}");
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT UNIQUE NOT NULL,
                email           TEXT UNIQUE NOT NULL,
                full_name       TEXT,
                hashed_password TEXT NOT NULL,
                is_active       INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("users table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tokens (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                token      TEXT UNIQUE NOT NULL,
                user_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                revoked    INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("tokens table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS lessons (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                title      TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("lessons table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title         TEXT NOT NULL,
                lesson_id     INTEGER REFERENCES lessons(id) ON DELETE SET NULL,
                template_name TEXT NOT NULL DEFAULT 'default',
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("conversations table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                role            TEXT NOT NULL,
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("messages table: {e}")))?;

        for (name, stmt) in [
            (
                "tokens token index",
                "CREATE INDEX IF NOT EXISTS idx_tokens_token ON tokens(token)",
            ),
            (
                "conversations user index",
                "CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id)",
            ),
            (
                "messages conversation index",
                "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id)",
            ),
        ] {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::MigrationFailed(format!("{name}: {e}")))?;
        }

        debug!("Database migrations complete");
        Ok(())
    }
}

/// Parse a stored RFC 3339 timestamp.
pub(crate) fn parse_timestamp(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, StorageError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| StorageError::QueryFailed(format!("timestamp {raw:?}: {e}")))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = test_support::memory_db().await;
        db.run_migrations().await.unwrap();
        db.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_timestamp_surfaces_as_query_error() {
        let db = test_support::memory_db().await;
        let user = test_support::seed_user(&db, "alice").await;
        sqlx::query("UPDATE users SET created_at = 'not-a-date' WHERE id = ?")
            .bind(user.id)
            .execute(db.pool())
            .await
            .unwrap();

        assert!(matches!(
            db.get_user(user.id).await.unwrap_err(),
            StorageError::QueryFailed(_)
        ));
    }

    #[tokio::test]
    async fn deleting_user_cascades_to_conversations_and_messages() {
        let db = test_support::memory_db().await;
        let user = test_support::seed_user(&db, "alice").await;
        let conv = db
            .create_conversation(user.id, "First chat", None, "default")
            .await
            .unwrap();
        db.add_message(conv.id, mentora_core::message::Role::User, "hi")
            .await
            .unwrap();

        db.delete_user(user.id).await.unwrap();

        assert!(matches!(
            db.get_conversation(conv.id).await.unwrap_err(),
            StorageError::NotFound { .. }
        ));
        assert!(db.get_messages(conv.id).await.unwrap().is_empty());
    }
}
