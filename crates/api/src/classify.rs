//! Classification service: bridges stored rules/events to the pure
//! evaluator and writes decisions back, including override bookkeeping and
//! downstream recomputation.

use chrono::{NaiveDate, TimeZone, Utc};

use db::models::{
    ApplyClassification, CalendarEvent, ClassificationSource, CreateOverride, User,
};
use db::{EventRepository, ProjectRepository, RuleRepository};
use domain::classify::{
    classify_event, synthesize_fingerprint_rules, ClassificationOutcome, EventFacts,
    ProjectFingerprints, Query, RuleCandidate, RuleOrigin, RuleTarget,
};
use shared::types::{EventId, ProjectId, UserId};
use shared::{AppError, AppResult, DomainError};

use crate::metrics;
use crate::state::AppState;
use crate::timesheet;

/// Load enabled user rules and synthesized fingerprint rules for evaluation
pub async fn build_candidates(state: &AppState, user_id: UserId) -> AppResult<Vec<RuleCandidate>> {
    let mut candidates = Vec::new();

    for rule in RuleRepository::list_enabled(&state.pool, user_id).await? {
        let query = match Query::parse(&rule.query) {
            Ok(query) => query,
            Err(err) => {
                // Stored rules are validated at save time; a parse failure
                // here means the grammar changed underneath them.
                tracing::warn!(rule_id = %rule.id, error = %err, "Skipping unparseable rule");
                continue;
            }
        };

        let target = match (rule.project_id, rule.attended) {
            (Some(project_id), None) => RuleTarget::Project(project_id),
            (None, Some(attended)) => RuleTarget::Attended(attended),
            _ => continue,
        };

        candidates.push(RuleCandidate {
            id: Some(rule.id),
            query,
            target,
            weight: rule.weight,
            origin: RuleOrigin::User,
            created_at: rule.created_at,
        });
    }

    let fingerprints: Vec<ProjectFingerprints> =
        ProjectRepository::list_with_fingerprints(&state.pool, user_id)
            .await?
            .into_iter()
            .map(|p| ProjectFingerprints {
                project_id: p.id,
                domains: p.fingerprint_domains,
                emails: p.fingerprint_emails,
                keywords: p.fingerprint_keywords,
                created_at: p.created_at,
            })
            .collect();

    candidates.extend(synthesize_fingerprint_rules(&fingerprints));
    Ok(candidates)
}

pub fn event_facts(event: &CalendarEvent) -> EventFacts {
    EventFacts {
        title: event.title.clone(),
        description: event.description.clone(),
        attendee_emails: event.attendees.clone(),
        organizer_email: event.organizer_email.clone(),
        response_status: event.response_status.clone(),
        is_recurring: event.is_recurring,
        transparency: event.transparency.clone(),
        start_time: Some(event.start_time),
    }
}

fn outcome_to_write(outcome: &ClassificationOutcome) -> Option<ApplyClassification> {
    if !outcome.classified {
        return None;
    }

    let source = match outcome.origin {
        Some(RuleOrigin::User) => ClassificationSource::Rule,
        Some(RuleOrigin::Fingerprint) => ClassificationSource::Fingerprint,
        None => ClassificationSource::Rule,
    };

    Some(ApplyClassification {
        project_id: outcome.project_id,
        is_skipped: outcome.is_skipped,
        source,
        confidence: Some(outcome.confidence),
        rule_id: outcome.rule_id,
        needs_review: outcome.needs_review,
    })
}

/// Run the evaluator over a set of events and store the outcomes.
///
/// Events already classified by hand are skipped unless `force` is set.
/// The classification writes and the recomputation of every affected day
/// commit together. Returns the events whose classification changed.
pub async fn apply_rules_to_events(
    state: &AppState,
    user: &User,
    events: Vec<CalendarEvent>,
    force: bool,
) -> AppResult<Vec<CalendarEvent>> {
    let candidates = build_candidates(state, user.id).await?;
    let projects = ProjectRepository::list_by_user(&state.pool, user.id, true).await?;

    let mut tx = state.pool.begin().await?;
    let mut changed = Vec::new();

    for event in events {
        if event.classification_source == Some(ClassificationSource::Manual) && !force {
            continue;
        }

        let outcome = classify_event(&event_facts(&event), &candidates);
        let Some(write) = outcome_to_write(&outcome) else {
            continue;
        };

        if write.project_id == event.project_id && write.is_skipped == event.is_skipped {
            continue;
        }

        let updated = EventRepository::apply_classification(&mut tx, user.id, event.id, write)
            .await?
            .ok_or_else(|| AppError::Domain(DomainError::EventNotFound(event.id.to_string())))?;
        changed.push(updated);
    }

    // Recompute every day the changed events touch, in the same transaction
    for date in EventRepository::affected_dates(&changed) {
        timesheet::recompute_date_in_tx(&mut tx, user, date, &projects).await?;
    }

    tx.commit().await?;

    for event in &changed {
        metrics::record_classified(
            &event
                .classification_source
                .map(|s| s.to_string())
                .unwrap_or_default(),
            1,
        );
    }

    Ok(changed)
}

/// Dry-run variant: report which events would change without mutating
pub async fn preview_rules_for_events(
    state: &AppState,
    user_id: UserId,
    events: &[CalendarEvent],
    force: bool,
) -> AppResult<Vec<(EventId, Option<ProjectId>, bool)>> {
    let candidates = build_candidates(state, user_id).await?;
    let mut would_change = Vec::new();

    for event in events {
        if event.classification_source == Some(ClassificationSource::Manual) && !force {
            continue;
        }

        let outcome = classify_event(&event_facts(event), &candidates);
        let Some(write) = outcome_to_write(&outcome) else {
            continue;
        };

        if write.project_id != event.project_id || write.is_skipped != event.is_skipped {
            would_change.push((event.id, write.project_id, write.is_skipped));
        }
    }

    Ok(would_change)
}

/// Manually classify one event to a project, or mark it did-not-attend.
///
/// Records an override for future learning, writes the decision with
/// source `manual` and confidence 1.0, and recomputes the affected day.
pub async fn classify_manual(
    state: &AppState,
    user: &User,
    event_id: EventId,
    project_id: Option<ProjectId>,
    skip: bool,
) -> AppResult<CalendarEvent> {
    let event = EventRepository::find_by_id(&state.pool, user.id, event_id)
        .await?
        .ok_or_else(|| AppError::Domain(DomainError::EventNotFound(event_id.to_string())))?;

    if let Some(project_id) = project_id {
        let project = ProjectRepository::find_by_id(&state.pool, user.id, project_id)
            .await?
            .ok_or_else(|| {
                AppError::Domain(DomainError::ProjectNotFound(project_id.to_string()))
            })?;
        if project.is_archived {
            return Err(AppError::Domain(DomainError::ProjectArchived));
        }
    }

    let projects = ProjectRepository::list_by_user(&state.pool, user.id, true).await?;

    let mut tx = state.pool.begin().await?;

    RuleRepository::insert_override(
        &mut tx,
        CreateOverride {
            user_id: user.id,
            event_id,
            from_project_id: event.project_id,
            to_project_id: project_id,
            from_source: event.classification_source,
            reason: None,
        },
    )
    .await?;

    let updated = EventRepository::apply_classification(
        &mut tx,
        user.id,
        event_id,
        ApplyClassification {
            project_id,
            is_skipped: skip,
            source: ClassificationSource::Manual,
            confidence: Some(1.0),
            rule_id: None,
            needs_review: false,
        },
    )
    .await?
    .ok_or_else(|| AppError::Domain(DomainError::EventNotFound(event_id.to_string())))?;

    // Override, classification, and entry recomputation commit together
    timesheet::recompute_date_in_tx(&mut tx, user, updated.start_time.date_naive(), &projects)
        .await?;

    tx.commit().await?;
    metrics::record_classified("manual", 1);

    Ok(updated)
}

/// Classify freshly synced events that are still pending
pub async fn classify_pending_in_window(
    state: &AppState,
    user: &User,
    start: NaiveDate,
    end: NaiveDate,
) -> AppResult<Vec<CalendarEvent>> {
    let window_start =
        Utc.from_utc_datetime(&start.and_hms_opt(0, 0, 0).expect("valid midnight"));
    let window_end =
        Utc.from_utc_datetime(&end.and_hms_opt(23, 59, 59).expect("valid day end"));

    let pending =
        EventRepository::list_pending(&state.pool, user.id, window_start, window_end).await?;
    apply_rules_to_events(state, user, pending, false).await
}
