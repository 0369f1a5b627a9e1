//! Lesson table operations.

use crate::{parse_timestamp, Database};
use chrono::Utc;
use mentora_core::error::StorageError;
use mentora_core::lesson::Lesson;
use sqlx::Row;

fn row_to_lesson(row: &sqlx::sqlite::SqliteRow) -> Result<Lesson, StorageError> {
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| StorageError::QueryFailed(format!("created_at column: {e}")))?;
    let updated_at: String = row
        .try_get("updated_at")
        .map_err(|e| StorageError::QueryFailed(format!("updated_at column: {e}")))?;
    Ok(Lesson {
        id: row
            .try_get("id")
            .map_err(|e| StorageError::QueryFailed(format!("id column: {e}")))?,
        title: row
            .try_get("title")
            .map_err(|e| StorageError::QueryFailed(format!("title column: {e}")))?,
        content: row
            .try_get("content")
            .map_err(|e| StorageError::QueryFailed(format!("content column: {e}")))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

impl Database {
    pub async fn create_lesson(&self, title: &str, content: &str) -> Result<Lesson, StorageError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO lessons (title, content, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        )
        .bind(title)
        .bind(content)
        .bind(&now)
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::QueryFailed(format!("insert lesson: {e}")))?;

        self.get_lesson(result.last_insert_rowid()).await
    }

    pub async fn get_lesson(&self, id: i64) -> Result<Lesson, StorageError> {
        let row = sqlx::query("SELECT * FROM lessons WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("get lesson: {e}")))?
            .ok_or(StorageError::NotFound {
                entity: "lesson",
                id: id.to_string(),
            })?;
        row_to_lesson(&row)
    }

    /// All lessons, most recently updated first.
    pub async fn list_lessons(&self) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query("SELECT * FROM lessons ORDER BY updated_at DESC")
            .fetch_all(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("list lessons: {e}")))?;
        rows.iter().map(row_to_lesson).collect()
    }

    /// Case-insensitive substring search over titles.
    pub async fn search_lessons(&self, query: &str) -> Result<Vec<Lesson>, StorageError> {
        let pattern = format!("%{query}%");
        let rows = sqlx::query(
            "SELECT * FROM lessons WHERE title LIKE ?1 COLLATE NOCASE ORDER BY updated_at DESC",
        )
        .bind(&pattern)
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::QueryFailed(format!("search lessons: {e}")))?;
        rows.iter().map(row_to_lesson).collect()
    }

    /// Update fields of a lesson. `None` leaves a field unchanged.
    pub async fn update_lesson(
        &self,
        id: i64,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Lesson, StorageError> {
        let existing = self.get_lesson(id).await?;
        let title = title.unwrap_or(&existing.title);
        let content = content.unwrap_or(&existing.content);
        let now = Utc::now().to_rfc3339();

        sqlx::query("UPDATE lessons SET title = ?1, content = ?2, updated_at = ?3 WHERE id = ?4")
            .bind(title)
            .bind(content)
            .bind(&now)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("update lesson: {e}")))?;

        self.get_lesson(id).await
    }

    pub async fn delete_lesson(&self, id: i64) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM lessons WHERE id = ?1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| StorageError::QueryFailed(format!("delete lesson: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "lesson",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_db;

    #[tokio::test]
    async fn lesson_crud_roundtrip() {
        let db = memory_db().await;
        let lesson = db
            .create_lesson("Pointers", "A pointer stores an address.")
            .await
            .unwrap();
        assert_eq!(lesson.title, "Pointers");

        let updated = db
            .update_lesson(lesson.id, None, Some("Updated content."))
            .await
            .unwrap();
        assert_eq!(updated.title, "Pointers");
        assert_eq!(updated.content, "Updated content.");
        assert!(updated.updated_at >= lesson.updated_at);

        db.delete_lesson(lesson.id).await.unwrap();
        assert!(matches!(
            db.get_lesson(lesson.id).await.unwrap_err(),
            StorageError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring() {
        let db = memory_db().await;
        db.create_lesson("Intro to Loops", "for and while").await.unwrap();
        db.create_lesson("Pointers", "addresses").await.unwrap();

        let hits = db.search_lessons("loops").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Intro to Loops");

        assert!(db.search_lessons("recursion").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_returns_all_lessons() {
        let db = memory_db().await;
        db.create_lesson("A", "a").await.unwrap();
        db.create_lesson("B", "b").await.unwrap();
        assert_eq!(db.list_lessons().await.unwrap().len(), 2);
    }
}
