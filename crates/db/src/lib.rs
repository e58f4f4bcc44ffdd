pub mod models;
pub mod repositories;

pub use models::*;
pub use repositories::*;

use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};

use shared::types::UserId;

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

/// Take a transaction-scoped advisory lock serializing recomputation for one
/// (user, date). Released automatically at commit or rollback.
pub async fn lock_user_date(
    conn: &mut PgConnection,
    user_id: UserId,
    date: NaiveDate,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1 || '|' || $2))")
        .bind(user_id.to_string())
        .bind(date.to_string())
        .execute(conn)
        .await?;
    Ok(())
}
