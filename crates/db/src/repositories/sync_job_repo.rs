//! Durable job queue for calendar sync work.
//!
//! Claims are linearizable via `FOR UPDATE SKIP LOCKED`; per-calendar
//! serialization falls out of the claim query, which never hands out a job
//! for a calendar that already has one running.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{EnqueueJob, SyncJob, SyncJobStatus};
use shared::types::{CalendarId, SyncJobId, UserId};

pub struct SyncJobRepository;

impl SyncJobRepository {
    /// Enqueue a job, coalescing with pending jobs for the same calendar.
    ///
    /// Overlapping pending jobs collapse into one covering the union of
    /// their ranges at the highest priority. Returns the surviving job.
    pub async fn enqueue(pool: &PgPool, input: EnqueueJob) -> Result<SyncJob, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let overlapping: Vec<SyncJob> = sqlx::query_as(
            r#"
            SELECT * FROM sync_jobs
            WHERE calendar_id = $1
              AND status = 'pending'
              AND target_min_date <= $3
              AND target_max_date >= $2
            ORDER BY created_at
            FOR UPDATE
            "#,
        )
        .bind(input.calendar_id.as_uuid())
        .bind(input.target_min_date)
        .bind(input.target_max_date)
        .fetch_all(&mut *tx)
        .await?;

        let job = if let Some(first) = overlapping.first() {
            let mut min = input.target_min_date;
            let mut max = input.target_max_date;
            let mut priority = input.priority;
            for existing in &overlapping {
                min = min.min(existing.target_min_date);
                max = max.max(existing.target_max_date);
                priority = priority.max(existing.priority);
            }

            for redundant in overlapping.iter().skip(1) {
                sqlx::query("DELETE FROM sync_jobs WHERE id = $1")
                    .bind(redundant.id.as_uuid())
                    .execute(&mut *tx)
                    .await?;
            }

            sqlx::query_as::<_, SyncJob>(
                r#"
                UPDATE sync_jobs
                SET target_min_date = $2, target_max_date = $3, priority = $4
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(first.id.as_uuid())
            .bind(min)
            .bind(max)
            .bind(priority)
            .fetch_one(&mut *tx)
            .await?
        } else {
            sqlx::query_as::<_, SyncJob>(
                r#"
                INSERT INTO sync_jobs (calendar_id, job_type, target_min_date, target_max_date, priority)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(input.calendar_id.as_uuid())
            .bind(input.job_type)
            .bind(input.target_min_date)
            .bind(input.target_max_date)
            .bind(input.priority)
            .fetch_one(&mut *tx)
            .await?
        };

        tx.commit().await?;
        Ok(job)
    }

    /// Atomically claim the next runnable job for a worker.
    ///
    /// Pending order is priority first, oldest first. A calendar with a
    /// running job yields nothing so fetches stay serialized per calendar.
    pub async fn claim_next(pool: &PgPool, worker_id: &str) -> Result<Option<SyncJob>, sqlx::Error> {
        sqlx::query_as::<_, SyncJob>(
            r#"
            UPDATE sync_jobs
            SET status = 'running', claimed_at = NOW(), claimed_by = $1
            WHERE id = (
                SELECT j.id FROM sync_jobs j
                WHERE j.status = 'pending'
                  AND j.run_after <= NOW()
                  AND NOT EXISTS (
                      SELECT 1 FROM sync_jobs r
                      WHERE r.calendar_id = j.calendar_id AND r.status = 'running'
                  )
                ORDER BY j.priority DESC, j.created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .fetch_optional(pool)
        .await
    }

    /// Return leases held past their lifetime to the pending state
    pub async fn release_expired_leases(
        pool: &PgPool,
        older_than: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE sync_jobs
            SET status = 'pending', claimed_at = NULL, claimed_by = NULL
            WHERE status = 'running' AND claimed_at < $1
            "#,
        )
        .bind(older_than)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn mark_completed(pool: &PgPool, id: SyncJobId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE sync_jobs
            SET status = 'completed', completed_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id.as_uuid())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_failed(
        pool: &PgPool,
        id: SyncJobId,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE sync_jobs
            SET status = 'failed', completed_at = NOW(), error_message = $2
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id.as_uuid())
        .bind(error)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Return a failed job to pending with a retry delay
    pub async fn requeue_with_backoff(
        pool: &PgPool,
        id: SyncJobId,
        run_after: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE sync_jobs
            SET status = 'pending', claimed_at = NULL, claimed_by = NULL,
                completed_at = NULL, error_message = NULL,
                attempt = attempt + 1, run_after = $2
            WHERE id = $1 AND status = 'failed'
            "#,
        )
        .bind(id.as_uuid())
        .bind(run_after)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Shutdown path: fail every running job this worker still holds
    pub async fn mark_interrupted(pool: &PgPool, worker_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE sync_jobs
            SET status = 'failed', completed_at = NOW(), error_message = 'interrupted'
            WHERE status = 'running' AND claimed_by = $1
            "#,
        )
        .bind(worker_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn find_by_id(pool: &PgPool, id: SyncJobId) -> Result<Option<SyncJob>, sqlx::Error> {
        sqlx::query_as::<_, SyncJob>("SELECT * FROM sync_jobs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_calendar(
        pool: &PgPool,
        calendar_id: CalendarId,
        limit: i64,
    ) -> Result<Vec<SyncJob>, sqlx::Error> {
        sqlx::query_as::<_, SyncJob>(
            r#"
            SELECT * FROM sync_jobs
            WHERE calendar_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(calendar_id.as_uuid())
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Recent jobs across a user's calendars, for observability
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<SyncJob>, sqlx::Error> {
        sqlx::query_as::<_, SyncJob>(
            r#"
            SELECT j.* FROM sync_jobs j
            JOIN calendars c ON j.calendar_id = c.id
            WHERE c.user_id = $1
            ORDER BY j.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Purge finished jobs older than the cutoff (audit retention)
    pub async fn purge_finished(
        pool: &PgPool,
        older_than: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM sync_jobs
            WHERE status IN ('completed', 'failed') AND completed_at < $1
            "#,
        )
        .bind(older_than)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn count_by_status(
        pool: &PgPool,
        status: SyncJobStatus,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sync_jobs WHERE status = $1")
                .bind(status)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}
