//! Calendar repository: calendar rows, selection, and sync state

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};

use crate::models::{Calendar, UpsertCalendar};
use shared::types::{CalendarId, ConnectionId, UserId};

pub struct CalendarRepository;

impl CalendarRepository {
    /// Upsert a calendar from the provider's calendar list.
    ///
    /// Sync state (watermarks, token, failure count) is preserved on update.
    pub async fn upsert(pool: &PgPool, input: UpsertCalendar) -> Result<Calendar, sqlx::Error> {
        sqlx::query_as::<_, Calendar>(
            r#"
            INSERT INTO calendars (connection_id, user_id, external_id, name, color, is_primary)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (connection_id, external_id)
            DO UPDATE SET name = EXCLUDED.name,
                          color = EXCLUDED.color,
                          is_primary = EXCLUDED.is_primary,
                          updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(input.connection_id.as_uuid())
        .bind(input.user_id.as_uuid())
        .bind(&input.external_id)
        .bind(&input.name)
        .bind(&input.color)
        .bind(input.is_primary)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        user_id: UserId,
        id: CalendarId,
    ) -> Result<Option<Calendar>, sqlx::Error> {
        sqlx::query_as::<_, Calendar>("SELECT * FROM calendars WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(pool)
            .await
    }

    /// Load a calendar without a user predicate (job workers only)
    pub async fn find_by_id_unscoped(
        pool: &PgPool,
        id: CalendarId,
    ) -> Result<Option<Calendar>, sqlx::Error> {
        sqlx::query_as::<_, Calendar>("SELECT * FROM calendars WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_user(pool: &PgPool, user_id: UserId) -> Result<Vec<Calendar>, sqlx::Error> {
        sqlx::query_as::<_, Calendar>(
            "SELECT * FROM calendars WHERE user_id = $1 ORDER BY is_primary DESC, name",
        )
        .bind(user_id.as_uuid())
        .fetch_all(pool)
        .await
    }

    pub async fn list_selected(
        pool: &PgPool,
        user_id: UserId,
    ) -> Result<Vec<Calendar>, sqlx::Error> {
        sqlx::query_as::<_, Calendar>(
            r#"
            SELECT * FROM calendars
            WHERE user_id = $1 AND is_selected = true
            ORDER BY is_primary DESC, name
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(pool)
        .await
    }

    pub async fn list_by_connection(
        pool: &PgPool,
        connection_id: ConnectionId,
    ) -> Result<Vec<Calendar>, sqlx::Error> {
        sqlx::query_as::<_, Calendar>(
            "SELECT * FROM calendars WHERE connection_id = $1 ORDER BY is_primary DESC, name",
        )
        .bind(connection_id.as_uuid())
        .fetch_all(pool)
        .await
    }

    pub async fn set_selected(
        pool: &PgPool,
        user_id: UserId,
        id: CalendarId,
        selected: bool,
    ) -> Result<Option<Calendar>, sqlx::Error> {
        sqlx::query_as::<_, Calendar>(
            r#"
            UPDATE calendars
            SET is_selected = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(selected)
        .fetch_optional(pool)
        .await
    }

    /// Selected calendars due for a background refresh.
    ///
    /// Quarantined calendars (needs_reauth or at the failure threshold) are
    /// excluded until a user intervenes.
    pub async fn list_due_for_background_sync(
        pool: &PgPool,
        older_than: DateTime<Utc>,
        failure_threshold: i32,
    ) -> Result<Vec<Calendar>, sqlx::Error> {
        sqlx::query_as::<_, Calendar>(
            r#"
            SELECT * FROM calendars
            WHERE is_selected = true
              AND needs_reauth = false
              AND sync_failure_count < $2
              AND (last_synced_at IS NULL OR last_synced_at < $1)
            ORDER BY last_synced_at NULLS FIRST
            "#,
        )
        .bind(older_than)
        .bind(failure_threshold)
        .fetch_all(pool)
        .await
    }

    /// Expand watermarks to cover `[start, end]` after a successful fetch.
    ///
    /// Watermarks only ever grow; `last_synced_at` is stamped and the
    /// failure count reset in the same statement.
    pub async fn expand_watermarks(
        conn: &mut PgConnection,
        id: CalendarId,
        start: NaiveDate,
        end: NaiveDate,
        synced_at: DateTime<Utc>,
    ) -> Result<Calendar, sqlx::Error> {
        sqlx::query_as::<_, Calendar>(
            r#"
            UPDATE calendars
            SET min_synced_date = LEAST(COALESCE(min_synced_date, $2), $2),
                max_synced_date = GREATEST(COALESCE(max_synced_date, $3), $3),
                last_synced_at = $4,
                sync_failure_count = 0,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(start)
        .bind(end)
        .bind(synced_at)
        .fetch_one(conn)
        .await
    }

    /// Stamp a successful incremental fetch that expanded nothing
    pub async fn record_sync_success(
        conn: &mut PgConnection,
        id: CalendarId,
        synced_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE calendars
            SET last_synced_at = $2, sync_failure_count = 0, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(synced_at)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_sync_token(
        conn: &mut PgConnection,
        id: CalendarId,
        sync_token: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE calendars SET sync_token = $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_uuid())
                .bind(sync_token)
                .execute(conn)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Increment the failure budget; returns the new count
    pub async fn record_sync_failure(pool: &PgPool, id: CalendarId) -> Result<i32, sqlx::Error> {
        let (count,): (i32,) = sqlx::query_as(
            r#"
            UPDATE calendars
            SET sync_failure_count = sync_failure_count + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING sync_failure_count
            "#,
        )
        .bind(id.as_uuid())
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    pub async fn set_needs_reauth(
        pool: &PgPool,
        id: CalendarId,
        needs_reauth: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE calendars SET needs_reauth = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(needs_reauth)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Token revocation affects every calendar on the connection
    pub async fn set_needs_reauth_for_connection(
        pool: &PgPool,
        connection_id: ConnectionId,
        needs_reauth: bool,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE calendars SET needs_reauth = $2, updated_at = NOW() WHERE connection_id = $1",
        )
        .bind(connection_id.as_uuid())
        .bind(needs_reauth)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Explicit user action clearing the quarantine
    pub async fn reset_quarantine(
        pool: &PgPool,
        user_id: UserId,
        id: CalendarId,
    ) -> Result<Option<Calendar>, sqlx::Error> {
        sqlx::query_as::<_, Calendar>(
            r#"
            UPDATE calendars
            SET sync_failure_count = 0, needs_reauth = false, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(pool)
        .await
    }
}
