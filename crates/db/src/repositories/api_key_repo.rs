use sqlx::PgPool;

use crate::models::{ApiKey, CreateApiKey};
use shared::types::{ApiKeyId, UserId};

pub struct ApiKeyRepository;

impl ApiKeyRepository {
    pub async fn create(pool: &PgPool, input: CreateApiKey) -> Result<ApiKey, sqlx::Error> {
        sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys (user_id, name, key_hash, key_prefix)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(input.user_id.as_uuid())
        .bind(&input.name)
        .bind(&input.key_hash)
        .bind(&input.key_prefix)
        .fetch_one(pool)
        .await
    }

    pub async fn list_by_user(pool: &PgPool, user_id: UserId) -> Result<Vec<ApiKey>, sqlx::Error> {
        sqlx::query_as::<_, ApiKey>(
            "SELECT * FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id.as_uuid())
        .fetch_all(pool)
        .await
    }

    /// Resolve a presented key by its hash, stamping last use
    pub async fn find_by_hash(pool: &PgPool, key_hash: &str) -> Result<Option<ApiKey>, sqlx::Error> {
        sqlx::query_as::<_, ApiKey>(
            r#"
            UPDATE api_keys
            SET last_used_at = NOW()
            WHERE key_hash = $1
            RETURNING *
            "#,
        )
        .bind(key_hash)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, user_id: UserId, id: ApiKeyId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
