//! Programmatic-access credentials: API keys and OAuth/PKCE sessions.
//!
//! Secrets are stored only as salted SHA-256 hashes; the short prefix is
//! kept for display in key listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use shared::types::{ApiKeyId, UserId};

/// A bearer API key (`ts_<hex>`), hashed at rest
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: ApiKeyId,
    pub user_id: UserId,
    pub name: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    /// First characters of the raw key, for display only
    pub key_prefix: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for storing a new API key
#[derive(Debug, Clone)]
pub struct CreateApiKey {
    pub user_id: UserId,
    pub name: String,
    pub key_hash: String,
    pub key_prefix: String,
}

/// An in-flight OAuth authorization (PKCE S256), short-lived
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OauthSession {
    pub id: Uuid,
    pub user_id: Option<UserId>,
    pub client_name: String,
    pub code_challenge: String,
    pub redirect_uri: String,
    #[serde(skip_serializing)]
    pub code_hash: Option<String>,
    pub code_expires_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Input for starting an OAuth session
#[derive(Debug, Clone)]
pub struct CreateOauthSession {
    pub client_name: String,
    pub code_challenge: String,
    pub redirect_uri: String,
    pub expires_at: DateTime<Utc>,
}

/// A bearer token minted by the PKCE code exchange
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OauthToken {
    pub id: Uuid,
    pub user_id: UserId,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub client_name: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
