//! Lesson domain type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A lesson is a unit of course material. From the chat engine's
/// perspective it is read-only context injected into the rendered
/// prompt; CRUD lives in the storage and gateway layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
