use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use crate::models::{BillingPeriod, CreateBillingPeriod};
use shared::types::{BillingPeriodId, ProjectId, UserId};

pub struct BillingPeriodRepository;

impl BillingPeriodRepository {
    /// True when `[starts_on, ends_on]` (open end = infinity) would overlap
    /// an existing period for the project. Run inside the insert transaction.
    pub async fn overlap_exists(
        conn: &mut PgConnection,
        user_id: UserId,
        project_id: ProjectId,
        starts_on: NaiveDate,
        ends_on: Option<NaiveDate>,
        exclude: Option<BillingPeriodId>,
    ) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM billing_periods
                WHERE user_id = $1
                  AND project_id = $2
                  AND ($5::uuid IS NULL OR id <> $5)
                  AND starts_on <= COALESCE($4, 'infinity'::date)
                  AND COALESCE(ends_on, 'infinity'::date) >= $3
            )
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(project_id.as_uuid())
        .bind(starts_on)
        .bind(ends_on)
        .bind(exclude.map(|id| *id.as_uuid()))
        .fetch_one(conn)
        .await?;

        Ok(exists)
    }

    pub async fn insert(
        conn: &mut PgConnection,
        input: CreateBillingPeriod,
    ) -> Result<BillingPeriod, sqlx::Error> {
        sqlx::query_as::<_, BillingPeriod>(
            r#"
            INSERT INTO billing_periods (user_id, project_id, starts_on, ends_on, hourly_rate)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(input.user_id.as_uuid())
        .bind(input.project_id.as_uuid())
        .bind(input.starts_on)
        .bind(input.ends_on)
        .bind(input.hourly_rate)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        user_id: UserId,
        id: BillingPeriodId,
    ) -> Result<Option<BillingPeriod>, sqlx::Error> {
        sqlx::query_as::<_, BillingPeriod>(
            "SELECT * FROM billing_periods WHERE id = $1 AND user_id = $2",
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_project(
        pool: &PgPool,
        user_id: UserId,
        project_id: ProjectId,
    ) -> Result<Vec<BillingPeriod>, sqlx::Error> {
        sqlx::query_as::<_, BillingPeriod>(
            r#"
            SELECT * FROM billing_periods
            WHERE user_id = $1 AND project_id = $2
            ORDER BY starts_on
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(project_id.as_uuid())
        .fetch_all(pool)
        .await
    }

    pub async fn list_by_user(
        pool: &PgPool,
        user_id: UserId,
    ) -> Result<Vec<BillingPeriod>, sqlx::Error> {
        sqlx::query_as::<_, BillingPeriod>(
            "SELECT * FROM billing_periods WHERE user_id = $1 ORDER BY project_id, starts_on",
        )
        .bind(user_id.as_uuid())
        .fetch_all(pool)
        .await
    }

    /// The period covering one day, if any
    pub async fn find_covering(
        conn: &mut PgConnection,
        user_id: UserId,
        project_id: ProjectId,
        day: NaiveDate,
    ) -> Result<Option<BillingPeriod>, sqlx::Error> {
        sqlx::query_as::<_, BillingPeriod>(
            r#"
            SELECT * FROM billing_periods
            WHERE user_id = $1
              AND project_id = $2
              AND starts_on <= $3
              AND COALESCE(ends_on, 'infinity'::date) >= $3
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(project_id.as_uuid())
        .bind(day)
        .fetch_optional(conn)
        .await
    }

    pub async fn delete(
        pool: &PgPool,
        user_id: UserId,
        id: BillingPeriodId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM billing_periods WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
