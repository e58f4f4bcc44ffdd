use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{CalendarConnection, CalendarProvider, CreateConnection};
use shared::types::{ConnectionId, UserId};

pub struct ConnectionRepository;

impl ConnectionRepository {
    /// Create or replace the connection for (user, provider).
    ///
    /// Re-authorizing overwrites the sealed credentials in place so a user
    /// always has at most one active connection per provider.
    pub async fn upsert(
        pool: &PgPool,
        input: CreateConnection,
    ) -> Result<CalendarConnection, sqlx::Error> {
        sqlx::query_as::<_, CalendarConnection>(
            r#"
            INSERT INTO calendar_connections (user_id, provider, encrypted_credentials)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, provider)
            DO UPDATE SET encrypted_credentials = EXCLUDED.encrypted_credentials,
                          updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(input.user_id.as_uuid())
        .bind(input.provider)
        .bind(&input.encrypted_credentials)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        user_id: UserId,
        id: ConnectionId,
    ) -> Result<Option<CalendarConnection>, sqlx::Error> {
        sqlx::query_as::<_, CalendarConnection>(
            "SELECT * FROM calendar_connections WHERE id = $1 AND user_id = $2",
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_provider(
        pool: &PgPool,
        user_id: UserId,
        provider: CalendarProvider,
    ) -> Result<Option<CalendarConnection>, sqlx::Error> {
        sqlx::query_as::<_, CalendarConnection>(
            "SELECT * FROM calendar_connections WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id.as_uuid())
        .bind(provider)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_user(
        pool: &PgPool,
        user_id: UserId,
    ) -> Result<Vec<CalendarConnection>, sqlx::Error> {
        sqlx::query_as::<_, CalendarConnection>(
            "SELECT * FROM calendar_connections WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id.as_uuid())
        .fetch_all(pool)
        .await
    }

    /// Update the sealed credential envelope (after a token refresh)
    pub async fn update_credentials(
        pool: &PgPool,
        id: ConnectionId,
        encrypted_credentials: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE calendar_connections
            SET encrypted_credentials = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(encrypted_credentials)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn touch_last_synced(
        pool: &PgPool,
        id: ConnectionId,
        at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE calendar_connections SET last_synced_at = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(
        pool: &PgPool,
        user_id: UserId,
        id: ConnectionId,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM calendar_connections WHERE id = $1 AND user_id = $2")
                .bind(id.as_uuid())
                .bind(user_id.as_uuid())
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
