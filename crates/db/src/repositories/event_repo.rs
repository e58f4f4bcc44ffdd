//! Event repository: sync upserts and classification writes

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};

use crate::models::{ApplyClassification, CalendarEvent, ClassificationStatus, UpsertEvent};
use shared::types::{ConnectionId, EventId, UserId};

pub struct EventRepository;

impl EventRepository {
    /// Upsert an event from a provider fetch.
    ///
    /// Provider-owned fields are replaced; classification state survives the
    /// update so a resync never undoes a decision.
    pub async fn upsert(
        conn: &mut PgConnection,
        input: UpsertEvent,
    ) -> Result<CalendarEvent, sqlx::Error> {
        sqlx::query_as::<_, CalendarEvent>(
            r#"
            INSERT INTO calendar_events (
                connection_id, calendar_id, user_id, external_id, title, description,
                start_time, end_time, is_all_day, attendees, organizer_email,
                is_recurring, response_status, transparency
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (connection_id, external_id)
            DO UPDATE SET title = EXCLUDED.title,
                          description = EXCLUDED.description,
                          start_time = EXCLUDED.start_time,
                          end_time = EXCLUDED.end_time,
                          is_all_day = EXCLUDED.is_all_day,
                          attendees = EXCLUDED.attendees,
                          organizer_email = EXCLUDED.organizer_email,
                          is_recurring = EXCLUDED.is_recurring,
                          response_status = EXCLUDED.response_status,
                          transparency = EXCLUDED.transparency,
                          is_orphaned = false,
                          updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(input.connection_id.as_uuid())
        .bind(input.calendar_id.as_uuid())
        .bind(input.user_id.as_uuid())
        .bind(&input.external_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.start_time)
        .bind(input.end_time)
        .bind(input.is_all_day)
        .bind(&input.attendees)
        .bind(&input.organizer_email)
        .bind(input.is_recurring)
        .bind(&input.response_status)
        .bind(&input.transparency)
        .fetch_one(conn)
        .await
    }

    /// Soft-delete an event the provider cancelled.
    ///
    /// The classification is preserved for history; the event simply stops
    /// contributing hours.
    pub async fn mark_orphaned(
        conn: &mut PgConnection,
        connection_id: ConnectionId,
        external_id: &str,
    ) -> Result<Option<CalendarEvent>, sqlx::Error> {
        sqlx::query_as::<_, CalendarEvent>(
            r#"
            UPDATE calendar_events
            SET is_orphaned = true, updated_at = NOW()
            WHERE connection_id = $1 AND external_id = $2
            RETURNING *
            "#,
        )
        .bind(connection_id.as_uuid())
        .bind(external_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        user_id: UserId,
        id: EventId,
    ) -> Result<Option<CalendarEvent>, sqlx::Error> {
        sqlx::query_as::<_, CalendarEvent>(
            "SELECT * FROM calendar_events WHERE id = $1 AND user_id = $2",
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(pool)
        .await
    }

    /// Events overlapping a UTC window, selected calendars only
    pub async fn list_in_window(
        pool: &PgPool,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, sqlx::Error> {
        sqlx::query_as::<_, CalendarEvent>(
            r#"
            SELECT ce.* FROM calendar_events ce
            JOIN calendars c ON ce.calendar_id = c.id
            WHERE ce.user_id = $1
              AND c.is_selected = true
              AND ce.start_time < $3
              AND ce.end_time > $2
            ORDER BY ce.start_time, ce.id
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
    }

    /// Events that feed time computation for one day: classified to a
    /// project, attended, not orphaned or suppressed, on a selected calendar.
    pub async fn list_contributing(
        conn: &mut PgConnection,
        user_id: UserId,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, sqlx::Error> {
        sqlx::query_as::<_, CalendarEvent>(
            r#"
            SELECT ce.* FROM calendar_events ce
            JOIN calendars c ON ce.calendar_id = c.id
            WHERE ce.user_id = $1
              AND c.is_selected = true
              AND ce.project_id IS NOT NULL
              AND ce.is_orphaned = false
              AND ce.is_skipped = false
              AND ce.is_suppressed = false
              AND ce.start_time < $3
              AND ce.end_time > $2
            ORDER BY ce.start_time, ce.id
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(day_start)
        .bind(day_end)
        .fetch_all(conn)
        .await
    }

    /// Unclassified events in a window, oldest first
    pub async fn list_pending(
        pool: &PgPool,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, sqlx::Error> {
        sqlx::query_as::<_, CalendarEvent>(
            r#"
            SELECT ce.* FROM calendar_events ce
            JOIN calendars c ON ce.calendar_id = c.id
            WHERE ce.user_id = $1
              AND c.is_selected = true
              AND ce.classification_status = 'pending'
              AND ce.start_time < $3
              AND ce.end_time > $2
            ORDER BY ce.start_time, ce.id
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
    }

    /// Write a classification decision
    pub async fn apply_classification(
        conn: &mut PgConnection,
        user_id: UserId,
        id: EventId,
        input: ApplyClassification,
    ) -> Result<Option<CalendarEvent>, sqlx::Error> {
        sqlx::query_as::<_, CalendarEvent>(
            r#"
            UPDATE calendar_events
            SET classification_status = 'classified',
                classification_source = $3,
                classification_confidence = $4,
                classification_rule_id = $5,
                project_id = $6,
                is_skipped = $7,
                needs_review = $8,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(input.source)
        .bind(input.confidence)
        .bind(input.rule_id.map(|r| *r.as_uuid()))
        .bind(input.project_id.map(|p| *p.as_uuid()))
        .bind(input.is_skipped)
        .bind(input.needs_review)
        .fetch_optional(conn)
        .await
    }

    /// Reset an event to pending (used when a re-apply demotes a decision)
    pub async fn clear_classification(
        conn: &mut PgConnection,
        user_id: UserId,
        id: EventId,
    ) -> Result<Option<CalendarEvent>, sqlx::Error> {
        sqlx::query_as::<_, CalendarEvent>(
            r#"
            UPDATE calendar_events
            SET classification_status = 'pending',
                classification_source = NULL,
                classification_confidence = NULL,
                classification_rule_id = NULL,
                project_id = NULL,
                is_skipped = false,
                needs_review = false,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(conn)
        .await
    }

    pub async fn set_suppressed(
        pool: &PgPool,
        user_id: UserId,
        id: EventId,
        suppressed: bool,
    ) -> Result<Option<CalendarEvent>, sqlx::Error> {
        sqlx::query_as::<_, CalendarEvent>(
            r#"
            UPDATE calendar_events
            SET is_suppressed = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(suppressed)
        .fetch_optional(pool)
        .await
    }

    /// Distinct days (UTC) touched by a set of events
    pub fn affected_dates(events: &[CalendarEvent]) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = events
            .iter()
            .map(|e| e.start_time.date_naive())
            .collect();
        dates.sort();
        dates.dedup();
        dates
    }

    /// Count events classified by status (for review queues)
    pub async fn count_by_status(
        pool: &PgPool,
        user_id: UserId,
        status: ClassificationStatus,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM calendar_events WHERE user_id = $1 AND classification_status = $2",
        )
        .bind(user_id.as_uuid())
        .bind(status)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}
