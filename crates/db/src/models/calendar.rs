//! Calendar rows with per-calendar sync state

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use shared::types::{CalendarId, ConnectionId, UserId};

/// One calendar inside a connection, with its sync watermarks.
///
/// `[min_synced_date, max_synced_date]` is the inclusive interval for which
/// this calendar's events are known to be fully synced.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Calendar {
    pub id: CalendarId,
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub external_id: String,
    pub name: String,
    pub color: Option<String>,
    pub is_primary: bool,
    pub is_selected: bool,
    #[serde(skip_serializing)]
    pub sync_token: Option<String>,
    pub min_synced_date: Option<NaiveDate>,
    pub max_synced_date: Option<NaiveDate>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_failure_count: i32,
    pub needs_reauth: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Calendar {
    /// Quarantined calendars are excluded from automatic sync
    pub fn is_quarantined(&self, failure_threshold: i32) -> bool {
        self.needs_reauth || self.sync_failure_count >= failure_threshold
    }
}

/// Input for upserting a calendar from the provider's calendar list
#[derive(Debug, Clone)]
pub struct UpsertCalendar {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub external_id: String,
    pub name: String,
    pub color: Option<String>,
    pub is_primary: bool,
}
