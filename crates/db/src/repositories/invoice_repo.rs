use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use crate::models::{CreateInvoice, CreateLineItem, Invoice, InvoiceLineItem, InvoiceStatus};
use shared::types::{InvoiceId, ProjectId, UserId};

pub struct InvoiceRepository;

impl InvoiceRepository {
    /// True when `[period_start, period_end]` would overlap an existing
    /// invoice for the same project
    pub async fn overlap_exists(
        conn: &mut PgConnection,
        user_id: UserId,
        project_id: ProjectId,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM invoices
                WHERE user_id = $1
                  AND project_id = $2
                  AND period_start <= $4
                  AND period_end >= $3
            )
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(project_id.as_uuid())
        .bind(period_start)
        .bind(period_end)
        .fetch_one(conn)
        .await?;

        Ok(exists)
    }

    pub async fn insert(
        conn: &mut PgConnection,
        input: CreateInvoice,
    ) -> Result<Invoice, sqlx::Error> {
        sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                user_id, project_id, billing_period_id, invoice_number,
                period_start, period_end, invoice_date, status, total_hours, total_amount
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'draft', $8, $9)
            RETURNING *
            "#,
        )
        .bind(input.user_id.as_uuid())
        .bind(input.project_id.as_uuid())
        .bind(input.billing_period_id.map(|id| *id.as_uuid()))
        .bind(&input.invoice_number)
        .bind(input.period_start)
        .bind(input.period_end)
        .bind(input.invoice_date)
        .bind(input.total_hours)
        .bind(input.total_amount)
        .fetch_one(conn)
        .await
    }

    pub async fn insert_line_item(
        conn: &mut PgConnection,
        invoice_id: InvoiceId,
        input: CreateLineItem,
    ) -> Result<InvoiceLineItem, sqlx::Error> {
        sqlx::query_as::<_, InvoiceLineItem>(
            r#"
            INSERT INTO invoice_line_items (
                invoice_id, time_entry_id, date, description, hours, hourly_rate, amount
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(invoice_id.as_uuid())
        .bind(input.time_entry_id.as_uuid())
        .bind(input.date)
        .bind(&input.description)
        .bind(input.hours)
        .bind(input.hourly_rate)
        .bind(input.amount)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        user_id: UserId,
        id: InvoiceId,
    ) -> Result<Option<Invoice>, sqlx::Error> {
        sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_number(
        pool: &PgPool,
        user_id: UserId,
        invoice_number: &str,
    ) -> Result<Option<Invoice>, sqlx::Error> {
        sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE user_id = $1 AND invoice_number = $2",
        )
        .bind(user_id.as_uuid())
        .bind(invoice_number)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_user(pool: &PgPool, user_id: UserId) -> Result<Vec<Invoice>, sqlx::Error> {
        sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE user_id = $1 ORDER BY invoice_date DESC, created_at DESC",
        )
        .bind(user_id.as_uuid())
        .fetch_all(pool)
        .await
    }

    pub async fn list_line_items(
        pool: &PgPool,
        invoice_id: InvoiceId,
    ) -> Result<Vec<InvoiceLineItem>, sqlx::Error> {
        sqlx::query_as::<_, InvoiceLineItem>(
            "SELECT * FROM invoice_line_items WHERE invoice_id = $1 ORDER BY date",
        )
        .bind(invoice_id.as_uuid())
        .fetch_all(pool)
        .await
    }

    pub async fn update_status(
        pool: &PgPool,
        user_id: UserId,
        id: InvoiceId,
        status: InvoiceStatus,
    ) -> Result<Option<Invoice>, sqlx::Error> {
        sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(status)
        .fetch_optional(pool)
        .await
    }

    /// Delete a draft invoice; line items cascade via FK
    pub async fn delete(
        conn: &mut PgConnection,
        user_id: UserId,
        id: InvoiceId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM invoices WHERE id = $1 AND user_id = $2 AND status = 'draft'",
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
