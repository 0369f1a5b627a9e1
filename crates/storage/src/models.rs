//! Persisted record types.

use chrono::{DateTime, Utc};
use mentora_core::message::Role;
use serde::{Deserialize, Serialize};

/// A registered account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    /// Salted hash, never the plaintext password.
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// An issued bearer token. Tokens are signed values stored server-side
/// so that logout can revoke them before expiry.
#[derive(Debug, Clone)]
pub struct ApiToken {
    pub id: i64,
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl ApiToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

/// A persisted conversation owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    /// Optional lesson this conversation is grounded in.
    pub lesson_id: Option<i64>,
    /// Prompt template name; unknown names fall back to `default`.
    pub template_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One stored message inside a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn token_validity_window() {
        let now = Utc::now();
        let token = ApiToken {
            id: 1,
            token: "t".into(),
            user_id: 1,
            created_at: now,
            expires_at: now + Duration::hours(1),
            revoked: false,
        };
        assert!(token.is_valid_at(now));
        assert!(!token.is_valid_at(now + Duration::hours(2)));

        let revoked = ApiToken {
            revoked: true,
            ..token
        };
        assert!(!revoked.is_valid_at(now));
    }

    #[test]
    fn user_serialization_hides_password_hash() {
        let user = User {
            id: 1,
            username: "alice".into(),
            email: "alice@example.com".into(),
            full_name: None,
            hashed_password: "secret-hash".into(),
            is_active: true,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("alice"));
    }
}
