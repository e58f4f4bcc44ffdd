//! OAuth/PKCE session and token storage for programmatic clients

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateOauthSession, OauthSession, OauthToken};
use shared::types::UserId;

pub struct OauthRepository;

impl OauthRepository {
    pub async fn create_session(
        pool: &PgPool,
        input: CreateOauthSession,
    ) -> Result<OauthSession, sqlx::Error> {
        sqlx::query_as::<_, OauthSession>(
            r#"
            INSERT INTO oauth_sessions (client_name, code_challenge, redirect_uri, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&input.client_name)
        .bind(&input.code_challenge)
        .bind(&input.redirect_uri)
        .bind(input.expires_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find_session(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<OauthSession>, sqlx::Error> {
        sqlx::query_as::<_, OauthSession>(
            "SELECT * FROM oauth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// The user approved the session: attach them and store the code hash
    pub async fn authorize_session(
        pool: &PgPool,
        id: Uuid,
        user_id: UserId,
        code_hash: &str,
        code_expires_at: DateTime<Utc>,
    ) -> Result<Option<OauthSession>, sqlx::Error> {
        sqlx::query_as::<_, OauthSession>(
            r#"
            UPDATE oauth_sessions
            SET user_id = $2, code_hash = $3, code_expires_at = $4
            WHERE id = $1 AND expires_at > NOW()
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id.as_uuid())
        .bind(code_hash)
        .bind(code_expires_at)
        .fetch_optional(pool)
        .await
    }

    /// Find an authorized session by its one-time code hash
    pub async fn find_session_by_code_hash(
        pool: &PgPool,
        code_hash: &str,
    ) -> Result<Option<OauthSession>, sqlx::Error> {
        sqlx::query_as::<_, OauthSession>(
            r#"
            SELECT * FROM oauth_sessions
            WHERE code_hash = $1 AND code_expires_at > NOW()
            "#,
        )
        .bind(code_hash)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete_session(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM oauth_sessions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_token(
        pool: &PgPool,
        user_id: UserId,
        token_hash: &str,
        client_name: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<OauthToken, sqlx::Error> {
        sqlx::query_as::<_, OauthToken>(
            r#"
            INSERT INTO oauth_tokens (user_id, token_hash, client_name, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(token_hash)
        .bind(client_name)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find_token_by_hash(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<OauthToken>, sqlx::Error> {
        sqlx::query_as::<_, OauthToken>(
            "SELECT * FROM oauth_tokens WHERE token_hash = $1 AND expires_at > NOW()",
        )
        .bind(token_hash)
        .fetch_optional(pool)
        .await
    }

    /// Drop expired sessions and tokens
    pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let sessions = sqlx::query("DELETE FROM oauth_sessions WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;
        let tokens = sqlx::query("DELETE FROM oauth_tokens WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;

        Ok(sessions.rows_affected() + tokens.rows_affected())
    }
}
