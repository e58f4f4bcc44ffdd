//! Sync decision logic: answers whether a requested window needs a sync
//! given a calendar's watermarks, without touching storage or the provider.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use shared::types::DateRange;
use shared::week_start;

/// Why a sync is (or is not) needed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncReason {
    FreshData,
    StaleData,
    OutsideWindow,
    NoSyncedRange,
}

/// Outcome of the sync decision for a requested window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncDecision {
    pub needs_sync: bool,
    pub reason: SyncReason,
    /// Mondays of the weeks that are missing from the synced interval
    pub missing_weeks: Vec<NaiveDate>,
    /// True when the window is covered but the last sync is too old
    pub is_stale_refresh: bool,
}

/// Decide whether `target` needs a sync.
///
/// The target window is normalized to whole weeks (Monday through Sunday,
/// UTC). A week counts as synced only when it lies entirely inside
/// `[min_synced, max_synced]`.
pub fn decide_sync(
    min_synced: Option<NaiveDate>,
    max_synced: Option<NaiveDate>,
    last_synced_at: Option<DateTime<Utc>>,
    target: DateRange,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> SyncDecision {
    let aligned = target.align_to_weeks();
    let weeks = aligned.week_starts();

    let (min, max) = match (min_synced, max_synced) {
        (Some(min), Some(max)) => (min, max),
        _ => {
            return SyncDecision {
                needs_sync: true,
                reason: SyncReason::NoSyncedRange,
                missing_weeks: weeks,
                is_stale_refresh: false,
            };
        }
    };

    let missing: Vec<NaiveDate> = weeks
        .into_iter()
        .filter(|monday| !(min <= *monday && *monday + Duration::days(6) <= max))
        .collect();

    if missing.is_empty() {
        let stale = match last_synced_at {
            Some(at) => now - at > stale_after,
            None => true,
        };

        if stale {
            SyncDecision {
                needs_sync: true,
                reason: SyncReason::StaleData,
                missing_weeks: Vec::new(),
                is_stale_refresh: true,
            }
        } else {
            SyncDecision {
                needs_sync: false,
                reason: SyncReason::FreshData,
                missing_weeks: Vec::new(),
                is_stale_refresh: false,
            }
        }
    } else {
        SyncDecision {
            needs_sync: true,
            reason: SyncReason::OutsideWindow,
            missing_weeks: missing,
            is_stale_refresh: false,
        }
    }
}

/// Convenience: the week-aligned fetch window for a set of missing weeks
pub fn fetch_window_for_weeks(missing_weeks: &[NaiveDate]) -> Option<DateRange> {
    let first = *missing_weeks.first()?;
    let last = *missing_weeks.last()?;
    Some(DateRange {
        start: week_start(first),
        end: week_start(last) + Duration::days(6),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn range(start: NaiveDate, end: NaiveDate) -> DateRange {
        DateRange::new(start, end).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 20, 12, 0, 0).unwrap()
    }

    fn stale_after() -> Duration {
        Duration::hours(24)
    }

    #[test]
    fn test_no_watermarks_requires_full_sync() {
        let decision = decide_sync(
            None,
            None,
            None,
            range(date(2025, 1, 6), date(2025, 1, 19)),
            now(),
            stale_after(),
        );

        assert!(decision.needs_sync);
        assert_eq!(decision.reason, SyncReason::NoSyncedRange);
        assert_eq!(
            decision.missing_weeks,
            vec![date(2025, 1, 6), date(2025, 1, 13)]
        );
        assert!(!decision.is_stale_refresh);
    }

    #[test]
    fn test_covered_and_fresh() {
        // Watermarks [2025-01-06, 2025-01-26], synced an hour ago
        let decision = decide_sync(
            Some(date(2025, 1, 6)),
            Some(date(2025, 1, 26)),
            Some(now() - Duration::hours(1)),
            range(date(2025, 1, 13), date(2025, 1, 19)),
            now(),
            stale_after(),
        );

        assert!(!decision.needs_sync);
        assert_eq!(decision.reason, SyncReason::FreshData);
        assert!(decision.missing_weeks.is_empty());
    }

    #[test]
    fn test_covered_but_stale() {
        let decision = decide_sync(
            Some(date(2025, 1, 6)),
            Some(date(2025, 1, 26)),
            Some(now() - Duration::hours(25)),
            range(date(2025, 1, 13), date(2025, 1, 19)),
            now(),
            stale_after(),
        );

        assert!(decision.needs_sync);
        assert_eq!(decision.reason, SyncReason::StaleData);
        assert!(decision.is_stale_refresh);
    }

    #[test]
    fn test_covered_never_synced_counts_as_stale() {
        let decision = decide_sync(
            Some(date(2025, 1, 6)),
            Some(date(2025, 1, 26)),
            None,
            range(date(2025, 1, 13), date(2025, 1, 19)),
            now(),
            stale_after(),
        );

        assert!(decision.needs_sync);
        assert_eq!(decision.reason, SyncReason::StaleData);
        assert!(decision.is_stale_refresh);
    }

    #[test]
    fn test_outside_window_lists_missing_weeks() {
        // Request the week after the synced interval
        let decision = decide_sync(
            Some(date(2025, 1, 6)),
            Some(date(2025, 1, 26)),
            Some(now() - Duration::hours(1)),
            range(date(2025, 1, 27), date(2025, 2, 2)),
            now(),
            stale_after(),
        );

        assert!(decision.needs_sync);
        assert_eq!(decision.reason, SyncReason::OutsideWindow);
        assert_eq!(decision.missing_weeks, vec![date(2025, 1, 27)]);
    }

    #[test]
    fn test_partial_overlap_reports_only_uncovered_weeks() {
        let decision = decide_sync(
            Some(date(2025, 1, 13)),
            Some(date(2025, 1, 26)),
            Some(now() - Duration::hours(1)),
            range(date(2025, 1, 6), date(2025, 1, 26)),
            now(),
            stale_after(),
        );

        assert!(decision.needs_sync);
        assert_eq!(decision.reason, SyncReason::OutsideWindow);
        assert_eq!(decision.missing_weeks, vec![date(2025, 1, 6)]);
    }

    #[test]
    fn test_midweek_target_is_week_aligned() {
        // A Wednesday-to-Wednesday request spans three calendar weeks
        let decision = decide_sync(
            None,
            None,
            None,
            range(date(2025, 1, 15), date(2025, 1, 29)),
            now(),
            stale_after(),
        );

        assert_eq!(
            decision.missing_weeks,
            vec![date(2025, 1, 13), date(2025, 1, 20), date(2025, 1, 27)]
        );
    }

    #[test]
    fn test_fetch_window_for_weeks() {
        let window =
            fetch_window_for_weeks(&[date(2025, 1, 13), date(2025, 1, 20)]).unwrap();
        assert_eq!(window.start, date(2025, 1, 13));
        assert_eq!(window.end, date(2025, 1, 26));

        assert!(fetch_window_for_weeks(&[]).is_none());
    }
}
