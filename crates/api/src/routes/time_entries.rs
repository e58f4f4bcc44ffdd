use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use db::{TimeEntryRepository, UserRepository};
use shared::types::ProjectId;
use shared::{AppError, DateRange, DomainError};

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
    timesheet::{self, TimeEntryView},
};

#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub project_id: Option<String>,
}

/// Merged (ephemeral + materialized) entries for a date range
pub async fn list_time_entries(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListEntriesQuery>,
) -> ApiResult<Json<Vec<TimeEntryView>>> {
    let range = DateRange::new(query.start_date, query.end_date)
        .map_err(|e| ApiError::from(DomainError::InvalidDateRange(e.to_string())))?;

    let project_filter: Option<ProjectId> = match &query.project_id {
        Some(pid) => Some(
            pid.parse()
                .map_err(|_| ApiError::from(AppError::Validation("Invalid project ID".to_string())))?,
        ),
        None => None,
    };

    let user = UserRepository::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::UserNotFound(auth.user_id.to_string())))?;

    let entries = timesheet::list_merged(&state, &user, range, project_filter).await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct UpsertEntryRequest {
    pub project_id: String,
    pub date: NaiveDate,
    pub hours: Option<Decimal>,
    /// Double-Option: omitted = leave alone, null = clear
    #[serde(default, with = "double_option")]
    pub title: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub description: Option<Option<String>>,
}

/// Serde helper distinguishing an omitted field from an explicit null
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Deserialize::deserialize(deserializer).map(Some)
    }
}

/// Apply a user edit to the entry for (project, date), materializing it on
/// first touch.
pub async fn upsert_time_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpsertEntryRequest>,
) -> ApiResult<Json<TimeEntryView>> {
    let project_id: ProjectId = req
        .project_id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid project ID".to_string())))?;

    if let Some(hours) = req.hours {
        if hours < Decimal::ZERO {
            return Err(ApiError::from(AppError::Validation(
                "Hours must not be negative".to_string(),
            )));
        }
    }

    let user = UserRepository::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::UserNotFound(auth.user_id.to_string())))?;

    timesheet::upsert_user_edit(
        &state,
        &user,
        project_id,
        req.date,
        req.hours,
        req.title,
        req.description,
    )
    .await?;

    // Serve the merged view so computed values come along
    let entries = timesheet::list_merged(
        &state,
        &user,
        DateRange::single(req.date),
        Some(project_id),
    )
    .await?;

    entries
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| ApiError::from(DomainError::EntryNotFound(req.project_id)))
}

#[derive(Debug, Deserialize)]
pub struct SuppressEntryRequest {
    pub project_id: String,
    pub date: NaiveDate,
}

/// Persistently hide the entry for (project, date); recomputation will not
/// bring it back.
pub async fn suppress_time_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SuppressEntryRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let project_id: ProjectId = req
        .project_id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid project ID".to_string())))?;

    let user = UserRepository::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::UserNotFound(auth.user_id.to_string())))?;

    let entry = timesheet::suppress(&state, &user, project_id, req.date).await?;

    Ok(Json(serde_json::json!({
        "id": entry.id.to_string(),
        "is_suppressed": true,
    })))
}

#[derive(Debug, Deserialize)]
pub struct PinEntryRequest {
    pub pinned: bool,
}

pub async fn pin_time_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<PinEntryRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let entry_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid entry ID".to_string())))?;

    let entry = TimeEntryRepository::set_pinned(&state.pool, auth.user_id, entry_id, req.pinned)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::EntryNotFound(id)))?;

    Ok(Json(serde_json::json!({
        "id": entry.id.to_string(),
        "is_pinned": entry.is_pinned,
    })))
}

/// Delete a materialized entry, dropping any user edits. The entry falls
/// back to its ephemeral computed form on the next read. Invoiced or
/// locked entries cannot be deleted.
pub async fn delete_time_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let entry_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid entry ID".to_string())))?;

    let entry = TimeEntryRepository::find_by_id(&state.pool, auth.user_id, entry_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::EntryNotFound(id)))?;

    if entry.hours_immutable() {
        return Err(ApiError::from(DomainError::EntryLocked));
    }

    let mut tx = state.pool.begin().await?;
    TimeEntryRepository::delete(&mut tx, entry.id).await?;
    tx.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
