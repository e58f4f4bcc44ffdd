//! Durable sync jobs: the unit of work for background calendar fetches

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use shared::types::{CalendarId, SyncJobId};

/// What kind of fetch the job performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sync_job_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncJobType {
    InitialSync,
    ExpandWatermarks,
}

/// Job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sync_job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for SyncJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncJobStatus::Pending => write!(f, "pending"),
            SyncJobStatus::Running => write!(f, "running"),
            SyncJobStatus::Completed => write!(f, "completed"),
            SyncJobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A queued, claimed, or finished sync task for one calendar
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: SyncJobId,
    pub calendar_id: CalendarId,
    pub job_type: SyncJobType,
    pub target_min_date: NaiveDate,
    pub target_max_date: NaiveDate,
    pub status: SyncJobStatus,
    /// Higher first; user-initiated jobs outrank background ticks
    pub priority: i32,
    /// Retry attempt number; zero for first runs
    pub attempt: i32,
    /// Not claimable before this instant (retry backoff)
    pub run_after: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for enqueuing a job
#[derive(Debug, Clone)]
pub struct EnqueueJob {
    pub calendar_id: CalendarId,
    pub job_type: SyncJobType,
    pub target_min_date: NaiveDate,
    pub target_max_date: NaiveDate,
    pub priority: i32,
}
