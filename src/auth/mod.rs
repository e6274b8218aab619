//! Bearer-token sessions
//!
//! Tokens are random 32-byte values rendered as hex. Only the SHA-256 of a
//! token is stored. Clients present the token either as
//! `Authorization: Bearer <token>` or as a `quire_session` cookie.

use crate::error::Result;
use crate::storage::Store;
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "quire_session";

/// An authenticated requester
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Id of the signed-in user
    pub user_id: String,
}

impl Session {
    /// Session for `user_id`
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Generate a new random token
pub fn generate_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

/// SHA-256 of a token, hex encoded
///
/// # Examples
///
/// ```
/// use quire::auth::hash_token;
///
/// assert_eq!(hash_token("abc").len(), 64);
/// assert_eq!(hash_token("abc"), hash_token("abc"));
/// ```
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Issue a session token for an existing user
///
/// # Arguments
///
/// * `store` - Store holding the session table
/// * `user_id` - User the session belongs to
/// * `ttl` - Lifetime of the session
///
/// # Returns
///
/// Returns the plaintext token; it is not recoverable afterwards
///
/// # Errors
///
/// Returns error if the session cannot be stored
pub fn issue_session(store: &dyn Store, user_id: &str, ttl: Duration) -> Result<String> {
    let token = generate_token();
    store.create_session(&hash_token(&token), user_id, Utc::now() + ttl)?;
    tracing::info!(user_id = %user_id, "Issued session token");
    Ok(token)
}

/// Extract the session token from request headers
///
/// The `Authorization` header wins over the cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|t| !t.is_empty())
}

/// Resolve the requester's session
///
/// # Returns
///
/// Returns `None` when no token is presented or the token is unknown or expired
///
/// # Errors
///
/// Returns error if the store cannot be queried
pub fn resolve_session(store: &dyn Store, headers: &HeaderMap) -> Result<Option<Session>> {
    let Some(token) = extract_token(headers) else {
        return Ok(None);
    };

    Ok(store
        .get_session_user(&hash_token(&token), Utc::now())?
        .map(Session::new))
}
