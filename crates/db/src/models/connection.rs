//! Calendar connection: one authorized external account per provider

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use shared::types::{ConnectionId, UserId};

/// External calendar provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "calendar_provider", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CalendarProvider {
    Google,
}

impl std::fmt::Display for CalendarProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalendarProvider::Google => write!(f, "google"),
        }
    }
}

/// A user's authorized link to an external calendar account.
///
/// `encrypted_credentials` is a sealed AES-GCM envelope; only the provider
/// adapter ever sees the plaintext tokens.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CalendarConnection {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub provider: CalendarProvider,
    #[serde(skip_serializing)]
    pub encrypted_credentials: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a connection
#[derive(Debug, Clone)]
pub struct CreateConnection {
    pub user_id: UserId,
    pub provider: CalendarProvider,
    pub encrypted_credentials: String,
}
