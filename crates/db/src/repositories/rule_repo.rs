use sqlx::{PgConnection, PgPool};

use crate::models::{
    ClassificationOverride, ClassificationRule, CreateOverride, CreateRule, UpdateRule,
};
use shared::types::{EventId, RuleId, UserId};

pub struct RuleRepository;

impl RuleRepository {
    pub async fn create(pool: &PgPool, input: CreateRule) -> Result<ClassificationRule, sqlx::Error> {
        sqlx::query_as::<_, ClassificationRule>(
            r#"
            INSERT INTO classification_rules (user_id, query, project_id, attended, weight, is_enabled)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(input.user_id.as_uuid())
        .bind(&input.query)
        .bind(input.project_id.map(|p| *p.as_uuid()))
        .bind(input.attended)
        .bind(input.weight)
        .bind(input.is_enabled)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        user_id: UserId,
        id: RuleId,
    ) -> Result<Option<ClassificationRule>, sqlx::Error> {
        sqlx::query_as::<_, ClassificationRule>(
            "SELECT * FROM classification_rules WHERE id = $1 AND user_id = $2",
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_user(
        pool: &PgPool,
        user_id: UserId,
    ) -> Result<Vec<ClassificationRule>, sqlx::Error> {
        sqlx::query_as::<_, ClassificationRule>(
            "SELECT * FROM classification_rules WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id.as_uuid())
        .fetch_all(pool)
        .await
    }

    pub async fn list_enabled(
        pool: &PgPool,
        user_id: UserId,
    ) -> Result<Vec<ClassificationRule>, sqlx::Error> {
        sqlx::query_as::<_, ClassificationRule>(
            r#"
            SELECT * FROM classification_rules
            WHERE user_id = $1 AND is_enabled = true
            ORDER BY created_at
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        user_id: UserId,
        id: RuleId,
        input: UpdateRule,
    ) -> Result<Option<ClassificationRule>, sqlx::Error> {
        let mut query = String::from("UPDATE classification_rules SET updated_at = NOW()");
        let mut param_count = 2;

        if input.query.is_some() {
            param_count += 1;
            query.push_str(&format!(", query = ${}", param_count));
        }
        if input.project_id.is_some() {
            param_count += 1;
            query.push_str(&format!(", project_id = ${}", param_count));
        }
        if input.attended.is_some() {
            param_count += 1;
            query.push_str(&format!(", attended = ${}", param_count));
        }
        if input.weight.is_some() {
            param_count += 1;
            query.push_str(&format!(", weight = ${}", param_count));
        }
        if input.is_enabled.is_some() {
            param_count += 1;
            query.push_str(&format!(", is_enabled = ${}", param_count));
        }

        query.push_str(" WHERE id = $1 AND user_id = $2 RETURNING *");

        let mut q = sqlx::query_as::<_, ClassificationRule>(&query)
            .bind(id.as_uuid())
            .bind(user_id.as_uuid());

        if let Some(query_text) = input.query {
            q = q.bind(query_text);
        }
        if let Some(project_id) = input.project_id {
            q = q.bind(project_id.map(|p| *p.as_uuid()));
        }
        if let Some(attended) = input.attended {
            q = q.bind(attended);
        }
        if let Some(weight) = input.weight {
            q = q.bind(weight);
        }
        if let Some(is_enabled) = input.is_enabled {
            q = q.bind(is_enabled);
        }

        q.fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, user_id: UserId, id: RuleId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM classification_rules WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ============ Overrides ============

    /// Record a manual reclassification for future learning
    pub async fn insert_override(
        conn: &mut PgConnection,
        input: CreateOverride,
    ) -> Result<ClassificationOverride, sqlx::Error> {
        sqlx::query_as::<_, ClassificationOverride>(
            r#"
            INSERT INTO classification_overrides (
                user_id, event_id, from_project_id, to_project_id, from_source, reason
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(input.user_id.as_uuid())
        .bind(input.event_id.as_uuid())
        .bind(input.from_project_id.map(|p| *p.as_uuid()))
        .bind(input.to_project_id.map(|p| *p.as_uuid()))
        .bind(input.from_source)
        .bind(&input.reason)
        .fetch_one(conn)
        .await
    }

    pub async fn list_overrides_for_event(
        pool: &PgPool,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<Vec<ClassificationOverride>, sqlx::Error> {
        sqlx::query_as::<_, ClassificationOverride>(
            r#"
            SELECT * FROM classification_overrides
            WHERE user_id = $1 AND event_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(event_id.as_uuid())
        .fetch_all(pool)
        .await
    }
}
