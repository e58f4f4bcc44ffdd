//! Time-entry repository: materialized rows, computed-field refresh, and
//! the entry/event junction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::models::{CreateTimeEntry, RefreshComputed, TimeEntry};
use shared::types::{EventId, InvoiceId, ProjectId, TimeEntryId, UserId};

pub struct TimeEntryRepository;

impl TimeEntryRepository {
    pub async fn insert(
        conn: &mut PgConnection,
        input: CreateTimeEntry,
    ) -> Result<TimeEntry, sqlx::Error> {
        sqlx::query_as::<_, TimeEntry>(
            r#"
            INSERT INTO time_entries (
                id, user_id, project_id, date, hours, title, description, source,
                has_user_edits, snapshot_computed_hours, computed_hours,
                computed_title, computed_description, calculation_details
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(input.id.as_uuid())
        .bind(input.user_id.as_uuid())
        .bind(input.project_id.as_uuid())
        .bind(input.date)
        .bind(input.hours)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.source)
        .bind(input.has_user_edits)
        .bind(input.snapshot_computed_hours)
        .bind(input.computed_hours)
        .bind(&input.computed_title)
        .bind(&input.computed_description)
        .bind(&input.calculation_details)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        user_id: UserId,
        id: TimeEntryId,
    ) -> Result<Option<TimeEntry>, sqlx::Error> {
        sqlx::query_as::<_, TimeEntry>(
            "SELECT * FROM time_entries WHERE id = $1 AND user_id = $2",
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_key(
        conn: &mut PgConnection,
        user_id: UserId,
        project_id: ProjectId,
        date: NaiveDate,
    ) -> Result<Option<TimeEntry>, sqlx::Error> {
        sqlx::query_as::<_, TimeEntry>(
            r#"
            SELECT * FROM time_entries
            WHERE user_id = $1 AND project_id = $2 AND date = $3
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(project_id.as_uuid())
        .bind(date)
        .fetch_optional(conn)
        .await
    }

    /// Materialized entries in a date range, optionally for one project.
    /// Suppressed entries are included; callers filter for display.
    pub async fn list_in_range(
        pool: &PgPool,
        user_id: UserId,
        start: NaiveDate,
        end: NaiveDate,
        project_id: Option<ProjectId>,
    ) -> Result<Vec<TimeEntry>, sqlx::Error> {
        sqlx::query_as::<_, TimeEntry>(
            r#"
            SELECT * FROM time_entries
            WHERE user_id = $1
              AND date BETWEEN $2 AND $3
              AND ($4::uuid IS NULL OR project_id = $4)
            ORDER BY date, project_id
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(start)
        .bind(end)
        .bind(project_id.map(|p| *p.as_uuid()))
        .fetch_all(pool)
        .await
    }

    /// All materialized entries for one user-day (recompute working set)
    pub async fn list_by_date(
        conn: &mut PgConnection,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Vec<TimeEntry>, sqlx::Error> {
        sqlx::query_as::<_, TimeEntry>(
            "SELECT * FROM time_entries WHERE user_id = $1 AND date = $2 ORDER BY project_id",
        )
        .bind(user_id.as_uuid())
        .bind(date)
        .fetch_all(conn)
        .await
    }

    /// Refresh computed fields after recomputation, leaving user-editable
    /// fields untouched.
    pub async fn refresh_computed(
        conn: &mut PgConnection,
        id: TimeEntryId,
        input: RefreshComputed,
    ) -> Result<Option<TimeEntry>, sqlx::Error> {
        sqlx::query_as::<_, TimeEntry>(
            r#"
            UPDATE time_entries
            SET computed_hours = $2,
                computed_title = $3,
                computed_description = $4,
                calculation_details = $5,
                is_stale = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(input.computed_hours)
        .bind(&input.computed_title)
        .bind(&input.computed_description)
        .bind(&input.calculation_details)
        .bind(input.is_stale)
        .fetch_optional(conn)
        .await
    }

    /// For unlocked auto entries the hours track the computed value
    pub async fn update_tracked_hours(
        conn: &mut PgConnection,
        id: TimeEntryId,
        hours: Decimal,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE time_entries
            SET hours = $2, title = $3, description = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(hours)
        .bind(title)
        .bind(description)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Apply a user edit: hours/title/description become user-owned and the
    /// current computed hours are snapshotted for staleness detection.
    pub async fn apply_user_edit(
        conn: &mut PgConnection,
        id: TimeEntryId,
        hours: Option<Decimal>,
        title: Option<Option<String>>,
        description: Option<Option<String>>,
    ) -> Result<Option<TimeEntry>, sqlx::Error> {
        sqlx::query_as::<_, TimeEntry>(
            r#"
            UPDATE time_entries
            SET hours = COALESCE($2, hours),
                title = CASE WHEN $3 THEN $4 ELSE title END,
                description = CASE WHEN $5 THEN $6 ELSE description END,
                has_user_edits = true,
                snapshot_computed_hours = computed_hours,
                is_stale = false,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(hours)
        .bind(title.is_some())
        .bind(title.flatten())
        .bind(description.is_some())
        .bind(description.flatten())
        .fetch_optional(conn)
        .await
    }

    /// Protected entry whose project no longer has hours: zero the computed
    /// side and flag it stale.
    pub async fn zero_computed(
        conn: &mut PgConnection,
        id: TimeEntryId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE time_entries
            SET computed_hours = 0,
                computed_title = NULL,
                computed_description = NULL,
                is_stale = (has_user_edits AND snapshot_computed_hours IS DISTINCT FROM 0::numeric),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(conn: &mut PgConnection, id: TimeEntryId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM time_entries WHERE id = $1")
            .bind(id.as_uuid())
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_suppressed(
        conn: &mut PgConnection,
        user_id: UserId,
        id: TimeEntryId,
        suppressed: bool,
    ) -> Result<Option<TimeEntry>, sqlx::Error> {
        sqlx::query_as::<_, TimeEntry>(
            r#"
            UPDATE time_entries
            SET is_suppressed = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(suppressed)
        .fetch_optional(conn)
        .await
    }

    pub async fn set_pinned(
        pool: &PgPool,
        user_id: UserId,
        id: TimeEntryId,
        pinned: bool,
    ) -> Result<Option<TimeEntry>, sqlx::Error> {
        sqlx::query_as::<_, TimeEntry>(
            r#"
            UPDATE time_entries
            SET is_pinned = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(pinned)
        .fetch_optional(pool)
        .await
    }

    /// Lock an entry to an invoice
    pub async fn attach_invoice(
        conn: &mut PgConnection,
        id: TimeEntryId,
        invoice_id: InvoiceId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE time_entries
            SET invoice_id = $2, is_locked = true, updated_at = NOW()
            WHERE id = $1 AND invoice_id IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(invoice_id.as_uuid())
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Unlock all entries of a deleted draft invoice
    pub async fn detach_invoice(
        conn: &mut PgConnection,
        invoice_id: InvoiceId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE time_entries
            SET invoice_id = NULL, is_locked = false, updated_at = NOW()
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id.as_uuid())
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    // ============ Entry/event junction ============

    /// Replace the contributing-event set for an entry
    pub async fn replace_entry_events(
        conn: &mut PgConnection,
        entry_id: TimeEntryId,
        event_ids: &[EventId],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM time_entry_events WHERE time_entry_id = $1")
            .bind(entry_id.as_uuid())
            .execute(&mut *conn)
            .await?;

        for event_id in event_ids {
            sqlx::query(
                r#"
                INSERT INTO time_entry_events (time_entry_id, event_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(entry_id.as_uuid())
            .bind(event_id.as_uuid())
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    pub async fn list_entry_events(
        pool: &PgPool,
        entry_id: TimeEntryId,
    ) -> Result<Vec<EventId>, sqlx::Error> {
        let rows: Vec<(uuid::Uuid,)> = sqlx::query_as(
            "SELECT event_id FROM time_entry_events WHERE time_entry_id = $1 ORDER BY event_id",
        )
        .bind(entry_id.as_uuid())
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| EventId::from_uuid(id)).collect())
    }
}
