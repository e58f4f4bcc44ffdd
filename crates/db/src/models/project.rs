use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use shared::types::{ProjectId, UserId};

/// A billable (or not) bucket of work.
///
/// The fingerprint fields are hints from which classification rules are
/// synthesized at evaluation time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub user_id: UserId,
    pub name: String,
    pub short_code: Option<String>,
    pub client: Option<String>,
    pub color: String,
    pub is_billable: bool,
    pub is_archived: bool,
    pub is_hidden_by_default: bool,
    pub does_not_accumulate_hours: bool,
    pub fingerprint_domains: Vec<String>,
    pub fingerprint_emails: Vec<String>,
    pub fingerprint_keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub user_id: UserId,
    pub name: String,
    pub short_code: Option<String>,
    pub client: Option<String>,
    pub color: String,
    pub is_billable: bool,
    pub is_hidden_by_default: bool,
    pub does_not_accumulate_hours: bool,
    pub fingerprint_domains: Vec<String>,
    pub fingerprint_emails: Vec<String>,
    pub fingerprint_keywords: Vec<String>,
}

/// Input for updating a project; None leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub short_code: Option<Option<String>>,
    pub client: Option<Option<String>>,
    pub color: Option<String>,
    pub is_billable: Option<bool>,
    pub is_archived: Option<bool>,
    pub is_hidden_by_default: Option<bool>,
    pub does_not_accumulate_hours: Option<bool>,
    pub fingerprint_domains: Option<Vec<String>>,
    pub fingerprint_emails: Option<Vec<String>>,
    pub fingerprint_keywords: Option<Vec<String>>,
}
