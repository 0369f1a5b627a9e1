//! Password hashing, token signing, and the bearer-auth middleware.
//!
//! Passwords are stored as `base64(salt)$base64(sha256(salt || pw))`.
//! Access tokens are HMAC-SHA256 signed values of the form
//! `base64url(user_id:expiry:nonce).base64url(signature)`; every
//! issued token is also persisted, so validation checks both the
//! signature and the stored record (unexpired, not revoked). A token
//! that passes the signature check but was revoked at logout is
//! rejected.

use crate::{error, ErrorResponse, SharedState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use mentora_storage::User;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// The authenticated identity attached to a request by the middleware.
#[derive(Clone)]
pub struct CurrentUser {
    pub user: User,
    /// The raw bearer token, kept so logout can revoke it.
    pub token: String,
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::rng().fill_bytes(&mut salt);
    let digest = salted_digest(&salt, password);
    format!(
        "{}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(digest)
    )
}

/// Check a password against a stored hash. Malformed stored values
/// never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_b64, digest_b64)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (
        STANDARD_NO_PAD.decode(salt_b64),
        STANDARD_NO_PAD.decode(digest_b64),
    ) else {
        return false;
    };
    salted_digest(&salt, password).as_slice() == expected.as_slice()
}

fn salted_digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Signs and verifies access tokens.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Generate a random signing secret for deployments that did not
    /// configure one. Tokens signed with it die with the process.
    pub fn random_secret() -> Vec<u8> {
        let mut secret = vec![0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        secret
    }

    /// Issue a signed token for `user_id`, returning it with its
    /// expiry timestamp.
    pub fn issue(&self, user_id: i64) -> (String, DateTime<Utc>) {
        let expires_at = Utc::now() + self.ttl;
        let nonce = uuid::Uuid::new_v4();
        let payload = format!("{user_id}:{}:{nonce}", expires_at.timestamp());
        let encoded = URL_SAFE_NO_PAD.encode(&payload);
        let signature = self.sign(&encoded);
        (format!("{encoded}.{signature}"), expires_at)
    }

    /// Verify a token's signature and embedded expiry, returning the
    /// user id it was issued for.
    pub fn verify(&self, token: &str) -> Option<i64> {
        let (encoded, signature) = token.rsplit_once('.')?;
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(encoded.as_bytes());
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        mac.verify_slice(&signature).ok()?;

        let payload = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        let payload = String::from_utf8(payload).ok()?;
        let mut parts = payload.splitn(3, ':');
        let user_id: i64 = parts.next()?.parse().ok()?;
        let expiry: i64 = parts.next()?.parse().ok()?;
        if expiry <= Utc::now().timestamp() {
            return None;
        }
        Some(user_id)
    }

    fn sign(&self, encoded: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(encoded.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

/// Bearer-auth middleware for the protected API surface.
///
/// Loads the user and attaches a [`CurrentUser`] extension on success.
pub async fn require_auth(
    State(state): State<SharedState>,
    mut req: axum::extract::Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let unauthorized = || error(StatusCode::UNAUTHORIZED, "Invalid or expired token");

    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(unauthorized)?
        .to_string();

    let user_id = state.signer.verify(&token).ok_or_else(unauthorized)?;

    // The signature alone is not enough: logout revokes the stored row.
    let record = state
        .db
        .get_token(&token)
        .await
        .map_err(|e| {
            warn!(error = %e, "Token lookup failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        })?
        .ok_or_else(unauthorized)?;
    if !record.is_valid_at(Utc::now()) || record.user_id != user_id {
        return Err(unauthorized());
    }

    let user = state.db.get_user(user_id).await.map_err(|_| unauthorized())?;
    if !user.is_active {
        return Err(error(StatusCode::FORBIDDEN, "Inactive user"));
    }

    req.extensions_mut().insert(CurrentUser { user, token });
    Ok(next.run(req).await)
}
