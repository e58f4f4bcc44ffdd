use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use db::{SyncJobRepository, UserRepository};
use shared::{DateRange, DomainError};

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
    sync,
};

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Decide and enqueue syncs for the requested window across the user's
/// selected calendars.
pub async fn request_sync(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SyncRequest>,
) -> ApiResult<Json<Vec<sync::CalendarSyncPlan>>> {
    let range = DateRange::new(req.start_date, req.end_date)
        .map_err(|e| ApiError::from(DomainError::InvalidDateRange(e.to_string())))?;

    let user = UserRepository::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::UserNotFound(auth.user_id.to_string())))?;

    let plans = sync::request_sync(&state, &user, range).await?;
    Ok(Json(plans))
}

#[derive(Debug, Serialize)]
pub struct SyncJobResponse {
    pub id: String,
    pub calendar_id: String,
    pub job_type: String,
    pub status: String,
    pub target_min_date: NaiveDate,
    pub target_max_date: NaiveDate,
    pub priority: i32,
    pub attempt: i32,
    pub error_message: Option<String>,
    pub created_at: String,
}

/// Recent sync jobs across the user's calendars
pub async fn list_sync_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<SyncJobResponse>>> {
    let jobs = SyncJobRepository::list_for_user(&state.pool, auth.user_id, 50).await?;

    Ok(Json(
        jobs.into_iter()
            .map(|j| SyncJobResponse {
                id: j.id.to_string(),
                calendar_id: j.calendar_id.to_string(),
                job_type: format!("{:?}", j.job_type),
                status: j.status.to_string(),
                target_min_date: j.target_min_date,
                target_max_date: j.target_max_date,
                priority: j.priority,
                attempt: j.attempt,
                error_message: j.error_message,
                created_at: j.created_at.to_rfc3339(),
            })
            .collect(),
    ))
}
