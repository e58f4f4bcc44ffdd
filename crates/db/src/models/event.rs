//! Calendar event rows and classification state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use shared::types::{CalendarId, ConnectionId, EventId, ProjectId, RuleId, UserId};

/// Classification lifecycle of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "classification_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClassificationStatus {
    Pending,
    Classified,
}

/// What decided an event's classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "classification_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Rule,
    Fingerprint,
    Manual,
    Llm,
}

impl std::fmt::Display for ClassificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassificationSource::Rule => write!(f, "rule"),
            ClassificationSource::Fingerprint => write!(f, "fingerprint"),
            ClassificationSource::Manual => write!(f, "manual"),
            ClassificationSource::Llm => write!(f, "llm"),
        }
    }
}

/// An event synced from the provider.
///
/// `(connection_id, external_id)` is unique. Orphaned events were deleted
/// upstream; they keep their classification for history but stop
/// contributing hours.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: EventId,
    pub connection_id: ConnectionId,
    pub calendar_id: CalendarId,
    pub user_id: UserId,
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_all_day: bool,
    pub attendees: Vec<String>,
    pub organizer_email: Option<String>,
    pub is_recurring: bool,
    pub response_status: Option<String>,
    pub transparency: Option<String>,
    pub is_orphaned: bool,
    pub is_suppressed: bool,
    pub is_skipped: bool,
    pub classification_status: ClassificationStatus,
    pub classification_source: Option<ClassificationSource>,
    pub classification_confidence: Option<f64>,
    pub classification_rule_id: Option<RuleId>,
    pub project_id: Option<ProjectId>,
    pub needs_review: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Whether this event can contribute hours to time entries
    pub fn contributes_time(&self) -> bool {
        !self.is_orphaned && !self.is_skipped && self.project_id.is_some()
    }
}

/// Input for upserting an event during sync
#[derive(Debug, Clone)]
pub struct UpsertEvent {
    pub connection_id: ConnectionId,
    pub calendar_id: CalendarId,
    pub user_id: UserId,
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_all_day: bool,
    pub attendees: Vec<String>,
    pub organizer_email: Option<String>,
    pub is_recurring: bool,
    pub response_status: Option<String>,
    pub transparency: Option<String>,
}

/// Input for writing a classification decision onto an event
#[derive(Debug, Clone)]
pub struct ApplyClassification {
    pub project_id: Option<ProjectId>,
    pub is_skipped: bool,
    pub source: ClassificationSource,
    pub confidence: Option<f64>,
    pub rule_id: Option<RuleId>,
    pub needs_review: bool,
}
