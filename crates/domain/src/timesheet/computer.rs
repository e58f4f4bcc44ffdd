use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::types::{EventId, ProjectId, TimeEntryId, UserId};
use uuid::Uuid;

use super::rounding::{round_minutes, RoundingConfig};

/// Namespace for deterministic (v5) ephemeral entry ids
pub const TIME_ENTRY_NAMESPACE: Uuid = Uuid::from_u128(0x8f3c_1b72_a94d_4e06_b210_5c77_39de_41aa);

/// A classified event contributing to one day's computation
#[derive(Debug, Clone)]
pub struct EventInput {
    pub id: EventId,
    pub project_id: ProjectId,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_all_day: bool,
}

/// Per-event line in the calculation audit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventCalculation {
    pub event_id: EventId,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
}

/// A merged interval in the calculation audit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RangeCalculation {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub minutes: i64,
}

/// Full audit trail for one computed entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalculationDetails {
    pub events: Vec<EventCalculation>,
    pub time_ranges: Vec<RangeCalculation>,
    pub union_minutes: i64,
    pub final_minutes: i64,
    pub rounding: String,
}

/// One per-(project, day) computed time entry
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedEntry {
    pub id: TimeEntryId,
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub date: NaiveDate,
    pub hours: Decimal,
    pub minutes: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub calculation: CalculationDetails,
    pub contributing_event_ids: Vec<EventId>,
}

/// Deterministic entry id for a (user, project, date) triple.
///
/// Ephemeral and materialized views of the same entry share this id.
pub fn entry_id(user_id: UserId, project_id: ProjectId, date: NaiveDate) -> TimeEntryId {
    let name = format!("{}|{}|{}", user_id, project_id, date);
    TimeEntryId::from_uuid(Uuid::new_v5(&TIME_ENTRY_NAMESPACE, name.as_bytes()))
}

/// Compute the time entries for one user-day from its classified events.
///
/// Events are grouped per project; each group's timed intervals are merged
/// (overlapping and back-to-back ranges collapse) and the union total is
/// rounded. All-day events contribute no hours but stay in the audit and
/// the contributing set.
pub fn compute_day(
    user_id: UserId,
    date: NaiveDate,
    events: &[EventInput],
    config: &RoundingConfig,
) -> Vec<ComputedEntry> {
    let mut by_project: BTreeMap<ProjectId, Vec<&EventInput>> = BTreeMap::new();
    for event in events {
        by_project.entry(event.project_id).or_default().push(event);
    }

    let mut entries = Vec::with_capacity(by_project.len());

    for (project_id, mut group) in by_project {
        group.sort_by_key(|e| (e.start, e.id));

        let intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> = group
            .iter()
            .filter(|e| !e.is_all_day && e.end > e.start)
            .map(|e| (e.start, e.end))
            .collect();

        let merged = merge_intervals(intervals);
        let union_minutes: i64 = merged.iter().map(|(s, e)| (*e - *s).num_minutes()).sum();
        let (final_minutes, adjustment) = round_minutes(union_minutes, config);

        let hours = (Decimal::from(final_minutes) / Decimal::from(60)).round_dp(2);

        let titles: Vec<&str> = group.iter().map(|e| e.title.as_str()).collect();
        let title = titles.first().map(|first| {
            if titles.len() > 1 {
                format!("{} +{} more", first, titles.len() - 1)
            } else {
                (*first).to_string()
            }
        });

        let mut unique_titles: Vec<&str> = Vec::new();
        for t in &titles {
            if !unique_titles.contains(t) {
                unique_titles.push(t);
            }
        }
        let description = if unique_titles.is_empty() {
            None
        } else {
            Some(unique_titles.join(", "))
        };

        let calculation = CalculationDetails {
            events: group
                .iter()
                .map(|e| EventCalculation {
                    event_id: e.id,
                    title: e.title.clone(),
                    start: e.start,
                    end: e.end,
                    all_day: e.is_all_day,
                })
                .collect(),
            time_ranges: merged
                .iter()
                .map(|(s, e)| RangeCalculation {
                    start: *s,
                    end: *e,
                    minutes: (*e - *s).num_minutes(),
                })
                .collect(),
            union_minutes,
            final_minutes,
            rounding: adjustment.to_string(),
        };

        entries.push(ComputedEntry {
            id: entry_id(user_id, project_id, date),
            user_id,
            project_id,
            date,
            hours,
            minutes: final_minutes,
            title,
            description,
            calculation,
            contributing_event_ids: group.iter().map(|e| e.id).collect(),
        });
    }

    entries
}

/// Merge sorted-or-unsorted intervals, collapsing overlapping and touching
/// ranges into their union.
fn merge_intervals(
    mut intervals: Vec<(DateTime<Utc>, DateTime<Utc>)>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    if intervals.is_empty() {
        return Vec::new();
    }

    intervals.sort_by_key(|(start, _)| *start);
    let mut merged = vec![intervals[0]];

    for (start, end) in intervals.into_iter().skip(1) {
        let last = merged.last_mut().unwrap();
        if start <= last.1 {
            last.1 = last.1.max(end);
        } else {
            merged.push((start, end));
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn user() -> UserId {
        UserId::from_uuid(Uuid::from_u128(1))
    }

    fn project(n: u128) -> ProjectId {
        ProjectId::from_uuid(Uuid::from_u128(n))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn event(
        id: u128,
        project_n: u128,
        title: &str,
        start: (u32, u32),
        end: (u32, u32),
    ) -> EventInput {
        EventInput {
            id: EventId::from_uuid(Uuid::from_u128(id)),
            project_id: project(project_n),
            title: title.to_string(),
            start: Utc
                .with_ymd_and_hms(2024, 1, 15, start.0, start.1, 0)
                .unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 15, end.0, end.1, 0).unwrap(),
            is_all_day: false,
        }
    }

    #[test]
    fn test_overlapping_events_union() {
        // 09:00-09:30 and 09:15-10:00 together cover 60 minutes
        let events = vec![
            event(1, 1, "Standup", (9, 0), (9, 30)),
            event(2, 1, "Planning", (9, 15), (10, 0)),
        ];

        let entries = compute_day(user(), date(), &events, &RoundingConfig::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].minutes, 60);
        assert_eq!(entries[0].hours, Decimal::new(100, 2));
        assert_eq!(entries[0].calculation.union_minutes, 60);
        assert_eq!(entries[0].calculation.time_ranges.len(), 1);
    }

    #[test]
    fn test_touching_events_merge() {
        let events = vec![
            event(1, 1, "A", (9, 0), (10, 0)),
            event(2, 1, "B", (10, 0), (11, 0)),
        ];

        let entries = compute_day(user(), date(), &events, &RoundingConfig::default());
        assert_eq!(entries[0].minutes, 120);
        assert_eq!(entries[0].calculation.time_ranges.len(), 1);
    }

    #[test]
    fn test_nested_interval_collapses() {
        let events = vec![
            event(1, 1, "Outer", (9, 0), (12, 0)),
            event(2, 1, "Inner", (10, 0), (10, 30)),
        ];

        let entries = compute_day(user(), date(), &events, &RoundingConfig::default());
        assert_eq!(entries[0].minutes, 180);
    }

    #[test]
    fn test_rounding_examples() {
        let entries = compute_day(
            user(),
            date(),
            &[event(1, 1, "Short", (9, 0), (9, 25))],
            &RoundingConfig::default(),
        );
        assert_eq!(entries[0].hours, Decimal::new(50, 2));
        assert_eq!(entries[0].calculation.rounding, "+5m");

        let entries = compute_day(
            user(),
            date(),
            &[event(1, 1, "Long", (9, 0), (9, 55))],
            &RoundingConfig::default(),
        );
        assert_eq!(entries[0].hours, Decimal::new(100, 2));
    }

    #[test]
    fn test_all_day_contributes_no_hours_but_is_referenced() {
        let mut all_day = event(1, 1, "Conference", (0, 0), (0, 0));
        all_day.is_all_day = true;
        let events = vec![all_day, event(2, 1, "Meeting", (9, 0), (10, 0))];

        let entries = compute_day(user(), date(), &events, &RoundingConfig::default());
        assert_eq!(entries[0].minutes, 60);
        assert_eq!(entries[0].contributing_event_ids.len(), 2);
        assert_eq!(entries[0].calculation.events.len(), 2);
    }

    #[test]
    fn test_projects_split() {
        let events = vec![
            event(1, 1, "A", (9, 0), (10, 0)),
            event(2, 2, "B", (9, 0), (10, 0)),
        ];

        let entries = compute_day(user(), date(), &events, &RoundingConfig::default());
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.minutes == 60));
    }

    #[test]
    fn test_title_and_description() {
        let events = vec![
            event(1, 1, "Standup", (9, 0), (9, 15)),
            event(2, 1, "Planning", (10, 0), (11, 0)),
            event(3, 1, "Standup", (16, 0), (16, 15)),
        ];

        let entries = compute_day(user(), date(), &events, &RoundingConfig::default());
        assert_eq!(entries[0].title.as_deref(), Some("Standup +2 more"));
        assert_eq!(entries[0].description.as_deref(), Some("Standup, Planning"));
    }

    #[test]
    fn test_deterministic_output_and_stable_id() {
        let events = vec![
            event(1, 1, "A", (9, 0), (10, 0)),
            event(2, 1, "B", (9, 30), (10, 30)),
        ];

        let first = compute_day(user(), date(), &events, &RoundingConfig::default());
        let second = compute_day(user(), date(), &events, &RoundingConfig::default());
        assert_eq!(first, second);

        let expected = entry_id(user(), project(1), date());
        assert_eq!(first[0].id, expected);
    }

    #[test]
    fn test_empty_input() {
        let entries = compute_day(user(), date(), &[], &RoundingConfig::default());
        assert!(entries.is_empty());
    }

    proptest! {
        #[test]
        fn prop_union_bounded_by_sum_and_max(
            starts in prop::collection::vec(0i64..600, 1..12),
            lengths in prop::collection::vec(1i64..120, 1..12),
        ) {
            let n = starts.len().min(lengths.len());
            let events: Vec<EventInput> = (0..n)
                .map(|i| {
                    let base = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
                    EventInput {
                        id: EventId::from_uuid(Uuid::from_u128(i as u128 + 1)),
                        project_id: project(1),
                        title: format!("E{}", i),
                        start: base + chrono::Duration::minutes(starts[i]),
                        end: base + chrono::Duration::minutes(starts[i] + lengths[i]),
                        is_all_day: false,
                    }
                })
                .collect();

            let no_rounding = RoundingConfig { granularity_minutes: 1, round_up_threshold_minutes: 1 };
            let entries = compute_day(user(), date(), &events, &no_rounding);
            let union = entries[0].minutes;

            let sum: i64 = lengths[..n].iter().sum();
            let longest = *lengths[..n].iter().max().unwrap();

            prop_assert!(union <= sum);
            prop_assert!(union >= longest);
        }

        #[test]
        fn prop_rounded_total_is_multiple_of_granularity(total in 0i64..10_000) {
            let config = RoundingConfig::default();
            let (rounded, _) = round_minutes(total, &config);
            prop_assert_eq!(rounded % config.granularity_minutes, 0);
            // Never moves more than the granularity
            prop_assert!((rounded - total).abs() < config.granularity_minutes);
        }
    }
}
