use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A time slot with start and end times in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSlot {
    /// Create a new time slot, validating that end is after start
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeSlotError> {
        if end <= start {
            return Err(TimeSlotError::EndBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    /// Get the duration of this time slot in minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Check if this time slot overlaps with another
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check if this time slot touches or overlaps another (back-to-back counts)
    pub fn touches(&self, other: &TimeSlot) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Check if this time slot contains a specific instant
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Errors constructing time slots
#[derive(Debug, thiserror::Error)]
pub enum TimeSlotError {
    #[error("End time {end} is not after start time {start}")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// An inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a date range, validating that end is not before start
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if end < start {
            return Err(DateRangeError::EndBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    /// Single-day range
    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Whether this range is fully inside another
    pub fn within(&self, outer: &DateRange) -> bool {
        outer.start <= self.start && self.end <= outer.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Union of two ranges (smallest range covering both)
    pub fn union(&self, other: &DateRange) -> DateRange {
        DateRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Number of days in the range, inclusive
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Iterate every day in the range
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        let count = self.num_days();
        (0..count).map(move |i| start + Duration::days(i))
    }

    /// Expand both bounds to whole weeks (Monday through Sunday)
    pub fn align_to_weeks(&self) -> DateRange {
        DateRange {
            start: week_start(self.start),
            end: week_start(self.end) + Duration::days(6),
        }
    }

    /// Monday of every week touched by this range
    pub fn week_starts(&self) -> Vec<NaiveDate> {
        let mut weeks = Vec::new();
        let mut cursor = week_start(self.start);
        let last = week_start(self.end);
        while cursor <= last {
            weeks.push(cursor);
            cursor += Duration::days(7);
        }
        weeks
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Errors constructing date ranges
#[derive(Debug, thiserror::Error)]
pub enum DateRangeError {
    #[error("End date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}

/// Monday of the week containing `day`
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.weekday().num_days_from_monday() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_slot_overlap() {
        let a = TimeSlot::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
        )
        .unwrap();
        let b = TimeSlot::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap(),
        )
        .unwrap();

        assert!(!a.overlaps(&b));
        assert!(a.touches(&b));
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2025-01-15 is a Wednesday
        assert_eq!(week_start(date(2025, 1, 15)), date(2025, 1, 13));
        // Monday maps to itself
        assert_eq!(week_start(date(2025, 1, 13)), date(2025, 1, 13));
        // Sunday maps back six days
        assert_eq!(week_start(date(2025, 1, 19)), date(2025, 1, 13));
    }

    #[test]
    fn test_align_to_weeks() {
        let range = DateRange::new(date(2025, 1, 15), date(2025, 1, 21)).unwrap();
        let aligned = range.align_to_weeks();
        assert_eq!(aligned.start, date(2025, 1, 13));
        assert_eq!(aligned.end, date(2025, 1, 26));
    }

    #[test]
    fn test_week_starts() {
        let range = DateRange::new(date(2025, 1, 27), date(2025, 2, 2)).unwrap();
        assert_eq!(range.week_starts(), vec![date(2025, 1, 27)]);

        let range = DateRange::new(date(2025, 1, 6), date(2025, 1, 20)).unwrap();
        assert_eq!(
            range.week_starts(),
            vec![date(2025, 1, 6), date(2025, 1, 13), date(2025, 1, 20)]
        );
    }

    #[test]
    fn test_range_days() {
        let range = DateRange::new(date(2025, 1, 6), date(2025, 1, 12)).unwrap();
        assert_eq!(range.num_days(), 7);
        let days: Vec<_> = range.days().collect();
        assert_eq!(days.first(), Some(&date(2025, 1, 6)));
        assert_eq!(days.last(), Some(&date(2025, 1, 12)));
    }

    #[test]
    fn test_range_union() {
        let a = DateRange::new(date(2025, 1, 6), date(2025, 1, 12)).unwrap();
        let b = DateRange::new(date(2025, 1, 10), date(2025, 1, 20)).unwrap();
        let u = a.union(&b);
        assert_eq!(u.start, date(2025, 1, 6));
        assert_eq!(u.end, date(2025, 1, 20));
    }
}
