use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use db::models::CalendarEvent;
use db::{EventRepository, UserRepository};
use shared::{AppError, DomainError};

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
    timesheet::{self, TimeEntryView},
    classify,
};

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub id: String,
    pub calendar_id: String,
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
    pub classification_status: String,
    pub classification_source: Option<String>,
    pub classification_confidence: Option<f64>,
    pub project_id: Option<String>,
    pub needs_review: bool,
}

impl From<CalendarEvent> for EventResponse {
    fn from(event: CalendarEvent) -> Self {
        Self {
            id: event.id.to_string(),
            calendar_id: event.calendar_id.to_string(),
            external_id: event.external_id,
            title: event.title,
            description: event.description,
            start_time: event.start_time,
            end_time: event.end_time,
            is_all_day: event.is_all_day,
            attendees: event.attendees,
            organizer_email: event.organizer_email,
            is_recurring: event.is_recurring,
            response_status: event.response_status,
            transparency: event.transparency,
            is_orphaned: event.is_orphaned,
            is_suppressed: event.is_suppressed,
            is_skipped: event.is_skipped,
            classification_status: format!("{:?}", event.classification_status).to_lowercase(),
            classification_source: event.classification_source.map(|s| s.to_string()),
            classification_confidence: event.classification_confidence,
            project_id: event.project_id.map(|p| p.to_string()),
            needs_review: event.needs_review,
        }
    }
}

pub async fn list_events(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListEventsQuery>,
) -> ApiResult<Json<Vec<EventResponse>>> {
    let start = Utc.from_utc_datetime(
        &query
            .start_date
            .and_hms_opt(0, 0, 0)
            .expect("valid midnight"),
    );
    let end = Utc.from_utc_datetime(
        &query
            .end_date
            .and_hms_opt(23, 59, 59)
            .expect("valid day end"),
    );

    let events = EventRepository::list_in_window(&state.pool, auth.user_id, start, end).await?;
    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub project_id: Option<String>,
    pub skip: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub event: EventResponse,
    pub time_entry: Option<TimeEntryView>,
}

/// Manually classify an event: to a project, or as did-not-attend.
/// Exactly one of `project_id` and `skip` must be given.
pub async fn classify_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<ClassifyRequest>,
) -> ApiResult<Json<ClassifyResponse>> {
    let event_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid event ID".to_string())))?;

    let skip = req.skip.unwrap_or(false);
    let project_id = match (&req.project_id, skip) {
        (Some(pid), false) => Some(
            pid.parse()
                .map_err(|_| ApiError::from(AppError::Validation("Invalid project ID".to_string())))?,
        ),
        (None, true) => None,
        _ => {
            return Err(ApiError::from(AppError::Validation(
                "Provide exactly one of project_id or skip".to_string(),
            )))
        }
    };

    let user = UserRepository::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::UserNotFound(auth.user_id.to_string())))?;

    let event = classify::classify_manual(&state, &user, event_id, project_id, skip).await?;

    // Return the merged entry the classification produced, if any
    let time_entry = match event.project_id {
        Some(project_id) => {
            let date = event.start_time.date_naive();
            timesheet::list_merged(
                &state,
                &user,
                shared::DateRange::single(date),
                Some(project_id),
            )
            .await?
            .into_iter()
            .next()
        }
        None => None,
    };

    Ok(Json(ClassifyResponse {
        event: event.into(),
        time_entry,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SuppressEventRequest {
    pub suppressed: bool,
}

/// Hide or unhide an event from time computation
pub async fn suppress_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<SuppressEventRequest>,
) -> ApiResult<Json<EventResponse>> {
    let event_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid event ID".to_string())))?;

    let event = EventRepository::set_suppressed(&state.pool, auth.user_id, event_id, req.suppressed)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::EventNotFound(id)))?;

    let user = UserRepository::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::UserNotFound(auth.user_id.to_string())))?;
    timesheet::recompute_date(&state, &user, event.start_time.date_naive()).await?;

    Ok(Json(event.into()))
}
