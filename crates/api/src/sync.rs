//! Sync engine: decides what to fetch, drives the provider adapter, and
//! keeps watermarks truthful.
//!
//! Jobs serialize per-calendar work; everything a single job writes
//! (events, watermarks, sync token) lands in one transaction.

use chrono::{Duration, Utc};
use serde::Serialize;

use db::models::{Calendar, EnqueueJob, SyncJob, SyncJobType, UpsertEvent, User};
use db::{
    CalendarRepository, ConnectionRepository, EventRepository, SyncJobRepository, UserRepository,
};
use domain::sync::{decide_sync, fetch_window_for_weeks, SyncDecision};
use integrations::{EventsPage, GoogleCalendarClient, GoogleError, StoredCredentials};
use shared::types::CalendarId;
use shared::{AppError, AppResult, DateRange, DomainError};

use crate::metrics;
use crate::state::AppState;
use crate::{classify, timesheet};

/// Maximum retries before a transient failure sticks
const MAX_ATTEMPTS: i32 = 5;
/// Base backoff for retried jobs
const RETRY_BASE_SECONDS: i64 = 30;

/// What one calendar sync accomplished
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub calendar_id: CalendarId,
    pub events_upserted: usize,
    pub events_orphaned: usize,
    pub used_incremental: bool,
}

/// Per-calendar answer to a user's sync request
#[derive(Debug, Serialize)]
pub struct CalendarSyncPlan {
    pub calendar_id: CalendarId,
    pub decision: SyncDecision,
    pub job_enqueued: bool,
}

/// Decide per selected calendar and enqueue user-priority jobs for the
/// ones that need fetching.
pub async fn request_sync(
    state: &AppState,
    user: &User,
    range: DateRange,
) -> AppResult<Vec<CalendarSyncPlan>> {
    let calendars = CalendarRepository::list_selected(&state.pool, user.id).await?;
    let now = Utc::now();
    let mut plans = Vec::new();

    for calendar in calendars {
        let decision = decide_sync(
            calendar.min_synced_date,
            calendar.max_synced_date,
            calendar.last_synced_at,
            range,
            now,
            state.config.stale_after,
        );

        let mut job_enqueued = false;
        if decision.needs_sync {
            let window = fetch_window_for_weeks(&decision.missing_weeks)
                .unwrap_or_else(|| range.align_to_weeks());
            let job_type = if calendar.min_synced_date.is_none() {
                SyncJobType::InitialSync
            } else {
                SyncJobType::ExpandWatermarks
            };

            SyncJobRepository::enqueue(
                &state.pool,
                EnqueueJob {
                    calendar_id: calendar.id,
                    job_type,
                    target_min_date: window.start,
                    target_max_date: window.end,
                    priority: 10,
                },
            )
            .await?;
            job_enqueued = true;
        }

        plans.push(CalendarSyncPlan {
            calendar_id: calendar.id,
            decision,
            job_enqueued,
        });
    }

    Ok(plans)
}

/// Open a connection's sealed credentials, refreshing the access token
/// first when it is about to expire. A revoked refresh token quarantines
/// every calendar on the connection.
pub async fn connection_credentials(
    state: &AppState,
    connection: &db::models::CalendarConnection,
) -> AppResult<StoredCredentials> {
    let mut credentials = state
        .vault
        .open(&connection.encrypted_credentials)
        .map_err(|e| AppError::Internal(format!("Credential envelope unreadable: {}", e)))?;

    let now = Utc::now();
    if credentials.needs_refresh(now) {
        let oauth = state
            .google_oauth
            .as_ref()
            .ok_or_else(|| AppError::Internal("Google OAuth not configured".to_string()))?;

        let refresh_token = credentials
            .refresh_token
            .clone()
            .ok_or(AppError::Domain(DomainError::NeedsReauth))?;

        match oauth.refresh(&refresh_token).await {
            Ok(response) => {
                credentials = response.into_credentials(Some(refresh_token), now);
                let sealed = state
                    .vault
                    .seal(&credentials)
                    .map_err(|e| AppError::Internal(format!("Credential seal failed: {}", e)))?;
                ConnectionRepository::update_credentials(&state.pool, connection.id, &sealed)
                    .await?;
            }
            Err(GoogleError::TokenRevoked) => {
                CalendarRepository::set_needs_reauth_for_connection(
                    &state.pool,
                    connection.id,
                    true,
                )
                .await?;
                return Err(AppError::Domain(DomainError::NeedsReauth));
            }
            Err(e) => return Err(AppError::ExternalApi(e.to_string())),
        }
    }

    Ok(credentials)
}

/// End-to-end synchronous sync of one calendar over a window.
///
/// Uses the stored sync token for incremental fetches when the window is
/// already covered; a provider-side token invalidation falls back to a
/// full window fetch. Event upserts, watermark expansion, and the token
/// update commit atomically.
pub async fn sync_calendar(
    state: &AppState,
    user: &User,
    calendar: &Calendar,
    window: DateRange,
) -> AppResult<SyncOutcome> {
    let timer = metrics::SyncTimer::start();

    let connection = ConnectionRepository::find_by_id(
        &state.pool,
        calendar.user_id,
        calendar.connection_id,
    )
    .await?
    .ok_or_else(|| {
        AppError::Domain(DomainError::ConnectionNotFound(
            calendar.connection_id.to_string(),
        ))
    })?;

    let credentials = connection_credentials(state, &connection).await?;
    let client = GoogleCalendarClient::new(credentials.access_token.clone());

    let covered = match (calendar.min_synced_date, calendar.max_synced_date) {
        (Some(min), Some(max)) => min <= window.start && window.end <= max,
        _ => false,
    };

    let mut used_incremental = false;
    let page: EventsPage = match (&calendar.sync_token, covered) {
        (Some(token), true) => match client
            .list_events_incremental(&calendar.external_id, token)
            .await
        {
            Ok(page) => {
                used_incremental = true;
                page
            }
            Err(GoogleError::SyncTokenInvalid) => {
                tracing::info!(calendar_id = %calendar.id, "Sync token invalidated, full fetch");
                client
                    .list_events_window(&calendar.external_id, window.start, window.end)
                    .await
                    .map_err(map_google_error)?
            }
            Err(e) => return Err(map_google_error(e)),
        },
        _ => client
            .list_events_window(&calendar.external_id, window.start, window.end)
            .await
            .map_err(map_google_error)?,
    };

    let now = Utc::now();
    let mut tx = state.pool.begin().await?;
    let mut affected_dates = Vec::new();

    for event in &page.events {
        let upserted = EventRepository::upsert(
            &mut tx,
            UpsertEvent {
                connection_id: calendar.connection_id,
                calendar_id: calendar.id,
                user_id: calendar.user_id,
                external_id: event.external_id.clone(),
                title: event.title.clone(),
                description: event.description.clone(),
                start_time: event.start,
                end_time: event.end,
                is_all_day: event.is_all_day,
                attendees: event.attendees.clone(),
                organizer_email: event.organizer_email.clone(),
                is_recurring: event.is_recurring,
                response_status: event.response_status.clone(),
                transparency: event.transparency.clone(),
            },
        )
        .await?;
        affected_dates.push(upserted.start_time.date_naive());
    }

    for external_id in &page.cancelled_ids {
        if let Some(orphaned) =
            EventRepository::mark_orphaned(&mut tx, calendar.connection_id, external_id).await?
        {
            affected_dates.push(orphaned.start_time.date_naive());
        }
    }

    CalendarRepository::expand_watermarks(&mut tx, calendar.id, window.start, window.end, now)
        .await?;

    if let Some(token) = &page.next_sync_token {
        CalendarRepository::update_sync_token(&mut tx, calendar.id, Some(token)).await?;
    }

    tx.commit().await?;

    ConnectionRepository::touch_last_synced(&state.pool, calendar.connection_id, now).await?;

    let outcome = SyncOutcome {
        calendar_id: calendar.id,
        events_upserted: page.events.len(),
        events_orphaned: page.cancelled_ids.len(),
        used_incremental,
    };

    metrics::record_sync_run("success", outcome.events_upserted as u64);
    timer.record();

    // Classify what the fetch brought in, then refresh orphaned days the
    // classifier did not touch.
    classify::classify_pending_in_window(state, user, window.start, window.end).await?;

    affected_dates.sort();
    affected_dates.dedup();
    for date in affected_dates {
        timesheet::recompute_date(state, user, date).await?;
    }

    Ok(outcome)
}

fn map_google_error(err: GoogleError) -> AppError {
    match err {
        GoogleError::TokenRevoked => AppError::Domain(DomainError::NeedsReauth),
        GoogleError::RateLimited => AppError::RateLimited,
        other => AppError::ExternalApi(other.to_string()),
    }
}

/// Run one claimed job to completion, handling the failure budget and
/// retry backoff.
pub async fn execute_job(state: &AppState, job: &SyncJob) -> AppResult<()> {
    metrics::record_job_claimed(&format!("{:?}", job.job_type));

    let calendar = CalendarRepository::find_by_id_unscoped(&state.pool, job.calendar_id)
        .await?
        .ok_or_else(|| {
            AppError::Domain(DomainError::CalendarNotFound(job.calendar_id.to_string()))
        })?;

    let user = UserRepository::find_by_id(&state.pool, calendar.user_id)
        .await?
        .ok_or_else(|| {
            AppError::Domain(DomainError::UserNotFound(calendar.user_id.to_string()))
        })?;

    let window = DateRange::new(job.target_min_date, job.target_max_date)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    match sync_calendar(state, &user, &calendar, window).await {
        Ok(outcome) => {
            tracing::info!(
                job_id = %job.id,
                calendar_id = %calendar.id,
                upserted = outcome.events_upserted,
                orphaned = outcome.events_orphaned,
                incremental = outcome.used_incremental,
                "Sync job completed"
            );
            SyncJobRepository::mark_completed(&state.pool, job.id).await?;
            Ok(())
        }
        Err(err) => {
            let failure_count =
                CalendarRepository::record_sync_failure(&state.pool, calendar.id).await?;
            metrics::record_sync_run("failure", 0);

            let message = err.to_string();
            SyncJobRepository::mark_failed(&state.pool, job.id, &message).await?;

            let retryable = matches!(
                err,
                AppError::ExternalApi(_) | AppError::RateLimited | AppError::Timeout
            );
            let quarantined = failure_count >= state.config.sync_failure_threshold;

            if retryable && !quarantined && job.attempt < MAX_ATTEMPTS {
                let delay = Duration::seconds(RETRY_BASE_SECONDS << job.attempt.min(6));
                SyncJobRepository::requeue_with_backoff(&state.pool, job.id, Utc::now() + delay)
                    .await?;
                tracing::warn!(
                    job_id = %job.id,
                    attempt = job.attempt + 1,
                    delay_seconds = delay.num_seconds(),
                    "Sync job failed, retrying: {}",
                    message
                );
            } else {
                tracing::error!(
                    job_id = %job.id,
                    calendar_id = %calendar.id,
                    failure_count,
                    quarantined,
                    "Sync job failed permanently: {}",
                    message
                );
            }

            Err(err)
        }
    }
}

/// Background tick: enqueue incremental refreshes for selected calendars
/// whose last sync is older than the staleness threshold. Quarantined
/// calendars are never selected.
pub async fn run_background_tick(state: &AppState) -> AppResult<usize> {
    let now = Utc::now();

    let released =
        SyncJobRepository::release_expired_leases(&state.pool, now - state.config.job_lease)
            .await?;
    if released > 0 {
        tracing::warn!(released, "Returned expired job leases to pending");
    }

    SyncJobRepository::purge_finished(&state.pool, now - Duration::days(30)).await?;

    let due = CalendarRepository::list_due_for_background_sync(
        &state.pool,
        now - state.config.stale_after,
        state.config.sync_failure_threshold,
    )
    .await?;

    let mut enqueued = 0;
    for calendar in due.into_iter().take(state.config.max_jobs_per_tick) {
        let window = match (calendar.min_synced_date, calendar.max_synced_date) {
            (Some(min), Some(max)) => DateRange { start: min, end: max },
            // Never synced: start with the current week
            _ => DateRange::single(now.date_naive()).align_to_weeks(),
        };

        SyncJobRepository::enqueue(
            &state.pool,
            EnqueueJob {
                calendar_id: calendar.id,
                job_type: if calendar.min_synced_date.is_none() {
                    SyncJobType::InitialSync
                } else {
                    SyncJobType::ExpandWatermarks
                },
                target_min_date: window.start,
                target_max_date: window.end,
                priority: 0,
            },
        )
        .await?;
        enqueued += 1;
    }

    Ok(enqueued)
}
