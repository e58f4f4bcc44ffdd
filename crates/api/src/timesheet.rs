//! Time-entry materializer: joins the pure computer's output with stored
//! rows, honoring the protection lattice and suppression.
//!
//! Reads are ephemeral by default; a row exists only once a user edit,
//! pin, suppression, or invoice needs durable state.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgConnection;

use db::models::{CreateTimeEntry, EntrySource, Project, RefreshComputed, TimeEntry, User};
use db::{lock_user_date, EventRepository, ProjectRepository, TimeEntryRepository};
use domain::timesheet::{compute_day, entry_id, ComputedEntry, EventInput, RoundingConfig};
use shared::types::{EventId, InvoiceId, ProjectId, TimeEntryId, UserId};
use shared::{AppError, AppResult, DateRange, DomainError};

use crate::metrics;
use crate::state::AppState;

/// Merged (ephemeral + materialized) entry served to clients
#[derive(Debug, Clone, Serialize)]
pub struct TimeEntryView {
    pub id: TimeEntryId,
    pub project_id: ProjectId,
    pub date: NaiveDate,
    pub hours: Decimal,
    pub title: Option<String>,
    pub description: Option<String>,
    pub source: EntrySource,
    pub is_ephemeral: bool,
    pub has_user_edits: bool,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub is_stale: bool,
    pub invoice_id: Option<InvoiceId>,
    pub computed_hours: Option<Decimal>,
    pub computed_title: Option<String>,
    pub computed_description: Option<String>,
    pub calculation_details: serde_json::Value,
    pub contributing_event_ids: Vec<EventId>,
}

impl TimeEntryView {
    fn from_ephemeral(computed: &ComputedEntry) -> Self {
        Self {
            id: computed.id,
            project_id: computed.project_id,
            date: computed.date,
            hours: computed.hours,
            title: computed.title.clone(),
            description: computed.description.clone(),
            source: EntrySource::Calendar,
            is_ephemeral: true,
            has_user_edits: false,
            is_pinned: false,
            is_locked: false,
            is_stale: false,
            invoice_id: None,
            computed_hours: Some(computed.hours),
            computed_title: computed.title.clone(),
            computed_description: computed.description.clone(),
            calculation_details: serde_json::to_value(&computed.calculation)
                .unwrap_or_default(),
            contributing_event_ids: computed.contributing_event_ids.clone(),
        }
    }

    fn from_materialized(entry: &TimeEntry, computed: Option<&ComputedEntry>) -> Self {
        Self {
            id: entry.id,
            project_id: entry.project_id,
            date: entry.date,
            hours: entry.hours,
            title: entry.title.clone(),
            description: entry.description.clone(),
            source: entry.source,
            is_ephemeral: false,
            has_user_edits: entry.has_user_edits,
            is_pinned: entry.is_pinned,
            is_locked: entry.is_locked,
            is_stale: staleness(entry, computed.map(|c| c.hours)),
            invoice_id: entry.invoice_id,
            computed_hours: computed.map(|c| c.hours).or(entry.computed_hours),
            computed_title: computed
                .and_then(|c| c.title.clone())
                .or_else(|| entry.computed_title.clone()),
            computed_description: computed
                .and_then(|c| c.description.clone())
                .or_else(|| entry.computed_description.clone()),
            calculation_details: computed
                .map(|c| serde_json::to_value(&c.calculation).unwrap_or_default())
                .unwrap_or_else(|| entry.calculation_details.clone()),
            contributing_event_ids: computed
                .map(|c| c.contributing_event_ids.clone())
                .unwrap_or_default(),
        }
    }
}

/// Staleness against the latest computed hours
fn staleness(entry: &TimeEntry, current_computed: Option<Decimal>) -> bool {
    entry.has_user_edits && entry.snapshot_computed_hours != current_computed.or(Some(Decimal::ZERO))
}

pub fn rounding_for(user: &User) -> RoundingConfig {
    RoundingConfig {
        granularity_minutes: user.rounding_granularity,
        round_up_threshold_minutes: user.rounding_threshold,
    }
}

fn day_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("valid midnight"));
    (start, start + chrono::Duration::days(1))
}

/// Compute one day's entries from its contributing events.
///
/// Events spanning midnight are clamped to the day; projects flagged
/// `does_not_accumulate_hours` are excluded entirely.
async fn compute_for_date(
    conn: &mut PgConnection,
    user_id: UserId,
    date: NaiveDate,
    rounding: &RoundingConfig,
    projects: &[Project],
) -> Result<Vec<ComputedEntry>, sqlx::Error> {
    let (day_start, day_end) = day_window(date);
    let events = EventRepository::list_contributing(conn, user_id, day_start, day_end).await?;

    let inputs: Vec<EventInput> = events
        .iter()
        .filter_map(|event| {
            let project_id = event.project_id?;
            let project = projects.iter().find(|p| p.id == project_id)?;
            if project.does_not_accumulate_hours {
                return None;
            }
            Some(EventInput {
                id: event.id,
                project_id,
                title: event.title.clone(),
                start: event.start_time.max(day_start),
                end: event.end_time.min(day_end),
                is_all_day: event.is_all_day,
            })
        })
        .collect();

    Ok(compute_day(user_id, date, &inputs, rounding))
}

/// Recompute one user-day and reconcile materialized rows.
///
/// Serialized per (user, date) by an advisory lock. Suppressed rows are
/// never touched; protected rows keep their hours; unprotected auto rows
/// with no remaining computed hours are deleted.
pub async fn recompute_date(state: &AppState, user: &User, date: NaiveDate) -> AppResult<usize> {
    let projects = ProjectRepository::list_by_user(&state.pool, user.id, true).await?;

    let mut tx = state.pool.begin().await?;
    let count = recompute_date_in_tx(&mut tx, user, date, &projects).await?;
    tx.commit().await?;

    metrics::record_recompute(count as u64);
    Ok(count)
}

/// Transaction-scoped recompute, for callers that must commit the
/// classification change and the entry reconciliation together.
pub async fn recompute_date_in_tx(
    tx: &mut PgConnection,
    user: &User,
    date: NaiveDate,
    projects: &[Project],
) -> AppResult<usize> {
    let rounding = rounding_for(user);

    lock_user_date(tx, user.id, date).await?;

    let computed = compute_for_date(tx, user.id, date, &rounding, projects).await?;
    let existing = TimeEntryRepository::list_by_date(tx, user.id, date).await?;

    let mut computed_by_project: std::collections::HashMap<ProjectId, &ComputedEntry> =
        computed.iter().map(|c| (c.project_id, c)).collect();

    for entry in &existing {
        if entry.is_suppressed {
            computed_by_project.remove(&entry.project_id);
            continue;
        }

        match computed_by_project.remove(&entry.project_id) {
            Some(c) => {
                let is_stale = entry.has_user_edits
                    && entry.snapshot_computed_hours != Some(c.hours);

                TimeEntryRepository::refresh_computed(
                    &mut *tx,
                    entry.id,
                    RefreshComputed {
                        computed_hours: c.hours,
                        computed_title: c.title.clone(),
                        computed_description: c.description.clone(),
                        calculation_details: serde_json::to_value(&c.calculation)
                            .unwrap_or_default(),
                        is_stale,
                    },
                )
                .await?;

                if !entry.has_user_edits && !entry.hours_immutable() {
                    TimeEntryRepository::update_tracked_hours(
                        &mut *tx,
                        entry.id,
                        c.hours,
                        c.title.as_deref(),
                        c.description.as_deref(),
                    )
                    .await?;
                }

                TimeEntryRepository::replace_entry_events(
                    &mut *tx,
                    entry.id,
                    &c.contributing_event_ids,
                )
                .await?;
            }
            None => {
                if entry.protected_from_delete() {
                    TimeEntryRepository::zero_computed(&mut *tx, entry.id).await?;
                } else {
                    TimeEntryRepository::delete(&mut *tx, entry.id).await?;
                }
            }
        }
    }

    Ok(computed.len())
}

/// Merged view over a date range: materialized rows win per (project, date),
/// ephemeral entries fill the gaps, and fresh computed values are attached
/// to everything.
pub async fn list_merged(
    state: &AppState,
    user: &User,
    range: DateRange,
    project_filter: Option<ProjectId>,
) -> AppResult<Vec<TimeEntryView>> {
    let rounding = rounding_for(user);
    let projects = ProjectRepository::list_by_user(&state.pool, user.id, true).await?;

    let mut conn = state.pool.acquire().await?;
    let mut computed_all: Vec<ComputedEntry> = Vec::new();
    for date in range.days() {
        let day = compute_for_date(&mut conn, user.id, date, &rounding, &projects).await?;
        computed_all.extend(day);
    }
    drop(conn);

    let materialized =
        TimeEntryRepository::list_in_range(&state.pool, user.id, range.start, range.end, project_filter)
            .await?;

    let mut views: Vec<TimeEntryView> = Vec::new();
    let mut taken: std::collections::HashSet<(ProjectId, NaiveDate)> =
        std::collections::HashSet::new();

    for entry in &materialized {
        taken.insert((entry.project_id, entry.date));
        if entry.is_suppressed {
            continue;
        }
        let computed = computed_all
            .iter()
            .find(|c| c.project_id == entry.project_id && c.date == entry.date);
        views.push(TimeEntryView::from_materialized(entry, computed));
    }

    for computed in &computed_all {
        if taken.contains(&(computed.project_id, computed.date)) {
            continue;
        }
        if let Some(filter) = project_filter {
            if computed.project_id != filter {
                continue;
            }
        }
        views.push(TimeEntryView::from_ephemeral(computed));
    }

    views.sort_by_key(|v| (v.date, v.project_id));
    Ok(views)
}

/// Apply a user edit for (project, date), materializing on first touch.
///
/// The current computed hours are snapshotted so later drift can be
/// detected as staleness.
pub async fn upsert_user_edit(
    state: &AppState,
    user: &User,
    project_id: ProjectId,
    date: NaiveDate,
    hours: Option<Decimal>,
    title: Option<Option<String>>,
    description: Option<Option<String>>,
) -> AppResult<TimeEntry> {
    let rounding = rounding_for(user);
    let projects = ProjectRepository::list_by_user(&state.pool, user.id, true).await?;

    let mut tx = state.pool.begin().await?;
    lock_user_date(&mut tx, user.id, date).await?;

    let existing = TimeEntryRepository::find_by_key(&mut tx, user.id, project_id, date).await?;

    let entry = match existing {
        Some(entry) => {
            if hours.is_some() && entry.hours_immutable() {
                return Err(AppError::Domain(DomainError::EntryLocked));
            }
            TimeEntryRepository::apply_user_edit(&mut tx, entry.id, hours, title, description)
                .await?
                .ok_or_else(|| AppError::Domain(DomainError::EntryNotFound(entry.id.to_string())))?
        }
        None => {
            let computed = compute_for_date(&mut tx, user.id, date, &rounding, &projects)
                .await?
                .into_iter()
                .find(|c| c.project_id == project_id);

            let (computed_hours, computed_title, computed_description, details, source) =
                match &computed {
                    Some(c) => (
                        Some(c.hours),
                        c.title.clone(),
                        c.description.clone(),
                        serde_json::to_value(&c.calculation).unwrap_or_default(),
                        EntrySource::Calendar,
                    ),
                    None => (None, None, None, serde_json::json!({}), EntrySource::Manual),
                };

            let entry = TimeEntryRepository::insert(
                &mut tx,
                CreateTimeEntry {
                    id: entry_id(user.id, project_id, date),
                    user_id: user.id,
                    project_id,
                    date,
                    hours: hours
                        .or(computed_hours)
                        .unwrap_or(Decimal::ZERO),
                    title: title.clone().flatten().or_else(|| computed_title.clone()),
                    description: description
                        .clone()
                        .flatten()
                        .or_else(|| computed_description.clone()),
                    source,
                    has_user_edits: true,
                    snapshot_computed_hours: computed_hours,
                    computed_hours,
                    computed_title,
                    computed_description,
                    calculation_details: details,
                },
            )
            .await?;

            if let Some(c) = &computed {
                TimeEntryRepository::replace_entry_events(
                    &mut tx,
                    entry.id,
                    &c.contributing_event_ids,
                )
                .await?;
            }

            entry
        }
    };

    tx.commit().await?;
    Ok(entry)
}

/// Persist a suppression for (project, date): the day shows no entry even
/// when events would compute one, and recomputation cannot recreate it.
pub async fn suppress(
    state: &AppState,
    user: &User,
    project_id: ProjectId,
    date: NaiveDate,
) -> AppResult<TimeEntry> {
    let mut tx = state.pool.begin().await?;
    lock_user_date(&mut tx, user.id, date).await?;

    let existing = TimeEntryRepository::find_by_key(&mut tx, user.id, project_id, date).await?;

    let entry = match existing {
        Some(entry) => {
            if entry.hours_immutable() {
                return Err(AppError::Domain(DomainError::EntryLocked));
            }
            TimeEntryRepository::set_suppressed(&mut tx, user.id, entry.id, true)
                .await?
                .ok_or_else(|| AppError::Domain(DomainError::EntryNotFound(entry.id.to_string())))?
        }
        None => {
            let entry = TimeEntryRepository::insert(
                &mut tx,
                CreateTimeEntry {
                    id: entry_id(user.id, project_id, date),
                    user_id: user.id,
                    project_id,
                    date,
                    hours: Decimal::ZERO,
                    title: None,
                    description: None,
                    source: EntrySource::Calendar,
                    has_user_edits: false,
                    snapshot_computed_hours: None,
                    computed_hours: None,
                    computed_title: None,
                    computed_description: None,
                    calculation_details: serde_json::json!({}),
                },
            )
            .await?;

            TimeEntryRepository::set_suppressed(&mut tx, user.id, entry.id, true)
                .await?
                .ok_or_else(|| AppError::Domain(DomainError::EntryNotFound(entry.id.to_string())))?
        }
    };

    tx.commit().await?;
    Ok(entry)
}

/// Materialize every day of an invoice range, inserting 0h placeholders
/// where nothing is stored or computed. Returns one entry per day.
pub async fn materialize_range_for_invoice(
    tx: &mut PgConnection,
    user: &User,
    project_id: ProjectId,
    range: DateRange,
    projects: &[Project],
) -> AppResult<Vec<TimeEntry>> {
    let rounding = rounding_for(user);
    let mut entries = Vec::new();

    for date in range.days() {
        lock_user_date(tx, user.id, date).await?;

        if let Some(entry) =
            TimeEntryRepository::find_by_key(tx, user.id, project_id, date).await?
        {
            entries.push(entry);
            continue;
        }

        let computed = compute_for_date(tx, user.id, date, &rounding, projects)
            .await?
            .into_iter()
            .find(|c| c.project_id == project_id);

        let entry = match &computed {
            Some(c) => {
                let entry = TimeEntryRepository::insert(
                    tx,
                    CreateTimeEntry {
                        id: c.id,
                        user_id: user.id,
                        project_id,
                        date,
                        hours: c.hours,
                        title: c.title.clone(),
                        description: c.description.clone(),
                        source: EntrySource::Calendar,
                        has_user_edits: false,
                        snapshot_computed_hours: Some(c.hours),
                        computed_hours: Some(c.hours),
                        computed_title: c.title.clone(),
                        computed_description: c.description.clone(),
                        calculation_details: serde_json::to_value(&c.calculation)
                            .unwrap_or_default(),
                    },
                )
                .await?;

                TimeEntryRepository::replace_entry_events(
                    tx,
                    entry.id,
                    &c.contributing_event_ids,
                )
                .await?;

                entry
            }
            None => {
                TimeEntryRepository::insert(
                    tx,
                    CreateTimeEntry {
                        id: entry_id(user.id, project_id, date),
                        user_id: user.id,
                        project_id,
                        date,
                        hours: Decimal::ZERO,
                        title: None,
                        description: None,
                        source: EntrySource::Calendar,
                        has_user_edits: false,
                        snapshot_computed_hours: Some(Decimal::ZERO),
                        computed_hours: Some(Decimal::ZERO),
                        computed_title: None,
                        computed_description: None,
                        calculation_details: serde_json::json!({}),
                    },
                )
                .await?
            }
        };

        entries.push(entry);
    }

    Ok(entries)
}
