use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use shared::types::{EventId, ProjectId, RuleId, UserId};

use super::ClassificationSource;

/// A stored classification rule.
///
/// Exactly one of `project_id` and `attended` is set; the query text has
/// been validated against the query grammar at save time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub id: RuleId,
    pub user_id: UserId,
    pub query: String,
    pub project_id: Option<ProjectId>,
    pub attended: Option<bool>,
    pub weight: f64,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a rule
#[derive(Debug, Clone)]
pub struct CreateRule {
    pub user_id: UserId,
    pub query: String,
    pub project_id: Option<ProjectId>,
    pub attended: Option<bool>,
    pub weight: f64,
    pub is_enabled: bool,
}

/// Input for updating a rule; None leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateRule {
    pub query: Option<String>,
    pub project_id: Option<Option<ProjectId>>,
    pub attended: Option<Option<bool>>,
    pub weight: Option<f64>,
    pub is_enabled: Option<bool>,
}

/// Immutable audit record of a manual reclassification
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClassificationOverride {
    pub id: Uuid,
    pub user_id: UserId,
    pub event_id: EventId,
    pub from_project_id: Option<ProjectId>,
    pub to_project_id: Option<ProjectId>,
    pub from_source: Option<ClassificationSource>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for recording an override
#[derive(Debug, Clone)]
pub struct CreateOverride {
    pub user_id: UserId,
    pub event_id: EventId,
    pub from_project_id: Option<ProjectId>,
    pub to_project_id: Option<ProjectId>,
    pub from_source: Option<ClassificationSource>,
    pub reason: Option<String>,
}
