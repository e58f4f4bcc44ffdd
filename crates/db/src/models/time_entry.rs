//! Materialized time entries and their protection flags

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use shared::types::{InvoiceId, ProjectId, TimeEntryId, UserId};

/// Where an entry's hours came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entry_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    Calendar,
    Manual,
}

/// A stored per-(user, project, date) time entry.
///
/// Protection lattice: a locked or invoiced entry never changes hours; a
/// pinned or user-edited entry is never auto-deleted; a suppressed entry is
/// kept (hidden) so recomputation cannot recreate it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: TimeEntryId,
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub date: NaiveDate,
    pub hours: Decimal,
    pub title: Option<String>,
    pub description: Option<String>,
    pub source: EntrySource,
    pub invoice_id: Option<InvoiceId>,
    pub has_user_edits: bool,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub is_stale: bool,
    pub is_suppressed: bool,
    /// Computed hours captured when the user last edited
    pub snapshot_computed_hours: Option<Decimal>,
    /// Latest computed hours, refreshed on every recompute
    pub computed_hours: Option<Decimal>,
    pub computed_title: Option<String>,
    pub computed_description: Option<String>,
    pub calculation_details: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    /// Hours may not change while an invoice references the entry
    pub fn hours_immutable(&self) -> bool {
        self.is_locked || self.invoice_id.is_some()
    }

    /// Recomputation may not delete this entry
    pub fn protected_from_delete(&self) -> bool {
        self.has_user_edits
            || self.is_pinned
            || self.is_locked
            || self.invoice_id.is_some()
            || self.is_suppressed
    }
}

/// Input for materializing an entry
#[derive(Debug, Clone)]
pub struct CreateTimeEntry {
    pub id: TimeEntryId,
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub date: NaiveDate,
    pub hours: Decimal,
    pub title: Option<String>,
    pub description: Option<String>,
    pub source: EntrySource,
    pub has_user_edits: bool,
    pub snapshot_computed_hours: Option<Decimal>,
    pub computed_hours: Option<Decimal>,
    pub computed_title: Option<String>,
    pub computed_description: Option<String>,
    pub calculation_details: serde_json::Value,
}

/// Computed fields refreshed on an existing materialized entry
#[derive(Debug, Clone)]
pub struct RefreshComputed {
    pub computed_hours: Decimal,
    pub computed_title: Option<String>,
    pub computed_description: Option<String>,
    pub calculation_details: serde_json::Value,
    pub is_stale: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry() -> TimeEntry {
        TimeEntry {
            id: TimeEntryId::new(),
            user_id: UserId::new(),
            project_id: ProjectId::new(),
            date: chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            hours: Decimal::new(100, 2),
            title: None,
            description: None,
            source: EntrySource::Calendar,
            invoice_id: None,
            has_user_edits: false,
            is_pinned: false,
            is_locked: false,
            is_stale: false,
            is_suppressed: false,
            snapshot_computed_hours: None,
            computed_hours: Some(Decimal::new(100, 2)),
            computed_title: None,
            computed_description: None,
            calculation_details: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_hours_immutable_when_locked_or_invoiced() {
        let mut e = entry();
        assert!(!e.hours_immutable());

        e.is_locked = true;
        assert!(e.hours_immutable());

        let mut e = entry();
        e.invoice_id = Some(InvoiceId::new());
        assert!(e.hours_immutable());
    }

    #[test]
    fn test_delete_protection() {
        let mut e = entry();
        assert!(!e.protected_from_delete());

        e.has_user_edits = true;
        assert!(e.protected_from_delete());

        let mut e = entry();
        e.is_pinned = true;
        assert!(e.protected_from_delete());

        let mut e = entry();
        e.is_suppressed = true;
        assert!(e.protected_from_delete());
    }
}
