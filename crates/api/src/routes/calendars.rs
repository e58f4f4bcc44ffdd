use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use db::models::Calendar;
use db::CalendarRepository;
use shared::{AppError, DomainError};

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ListCalendarsQuery {
    /// `selected` narrows to calendars participating in classification
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub id: String,
    pub connection_id: String,
    pub external_id: String,
    pub name: String,
    pub color: Option<String>,
    pub is_primary: bool,
    pub is_selected: bool,
    pub min_synced_date: Option<NaiveDate>,
    pub max_synced_date: Option<NaiveDate>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_failure_count: i32,
    pub needs_reauth: bool,
    pub is_quarantined: bool,
}

fn to_response(calendar: Calendar, failure_threshold: i32) -> CalendarResponse {
    let is_quarantined = calendar.is_quarantined(failure_threshold);
    CalendarResponse {
        id: calendar.id.to_string(),
        connection_id: calendar.connection_id.to_string(),
        external_id: calendar.external_id,
        name: calendar.name,
        color: calendar.color,
        is_primary: calendar.is_primary,
        is_selected: calendar.is_selected,
        min_synced_date: calendar.min_synced_date,
        max_synced_date: calendar.max_synced_date,
        last_synced_at: calendar.last_synced_at,
        sync_failure_count: calendar.sync_failure_count,
        needs_reauth: calendar.needs_reauth,
        is_quarantined,
    }
}

pub async fn list_calendars(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListCalendarsQuery>,
) -> ApiResult<Json<Vec<CalendarResponse>>> {
    let calendars = match query.state.as_deref() {
        Some("selected") => CalendarRepository::list_selected(&state.pool, auth.user_id).await?,
        _ => CalendarRepository::list_by_user(&state.pool, auth.user_id).await?,
    };

    let threshold = state.config.sync_failure_threshold;
    Ok(Json(
        calendars
            .into_iter()
            .map(|c| to_response(c, threshold))
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCalendarRequest {
    pub is_selected: Option<bool>,
    /// Explicit user action clearing the failure quarantine
    pub reset_quarantine: Option<bool>,
}

pub async fn update_calendar(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateCalendarRequest>,
) -> ApiResult<Json<CalendarResponse>> {
    let calendar_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid calendar ID".to_string())))?;

    let mut calendar = CalendarRepository::find_by_id(&state.pool, auth.user_id, calendar_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::CalendarNotFound(id.clone())))?;

    if req.reset_quarantine.unwrap_or(false) {
        calendar = CalendarRepository::reset_quarantine(&state.pool, auth.user_id, calendar_id)
            .await?
            .ok_or_else(|| ApiError::from(DomainError::CalendarNotFound(id.clone())))?;
    }

    if let Some(selected) = req.is_selected {
        calendar = CalendarRepository::set_selected(&state.pool, auth.user_id, calendar_id, selected)
            .await?
            .ok_or_else(|| ApiError::from(DomainError::CalendarNotFound(id)))?;
    }

    Ok(Json(to_response(
        calendar,
        state.config.sync_failure_threshold,
    )))
}
