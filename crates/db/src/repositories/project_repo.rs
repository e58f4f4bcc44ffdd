use sqlx::PgPool;

use crate::models::{CreateProject, Project, UpdateProject};
use shared::types::{ProjectId, UserId};

pub struct ProjectRepository;

impl ProjectRepository {
    pub async fn create(pool: &PgPool, input: CreateProject) -> Result<Project, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (
                user_id, name, short_code, client, color, is_billable,
                is_hidden_by_default, does_not_accumulate_hours,
                fingerprint_domains, fingerprint_emails, fingerprint_keywords
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(input.user_id.as_uuid())
        .bind(&input.name)
        .bind(&input.short_code)
        .bind(&input.client)
        .bind(&input.color)
        .bind(input.is_billable)
        .bind(input.is_hidden_by_default)
        .bind(input.does_not_accumulate_hours)
        .bind(&input.fingerprint_domains)
        .bind(&input.fingerprint_emails)
        .bind(&input.fingerprint_keywords)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        user_id: UserId,
        id: ProjectId,
    ) -> Result<Option<Project>, sqlx::Error> {
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_name(
        pool: &PgPool,
        user_id: UserId,
        name: &str,
    ) -> Result<Option<Project>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            "SELECT * FROM projects WHERE user_id = $1 AND lower(name) = lower($2)",
        )
        .bind(user_id.as_uuid())
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_user(
        pool: &PgPool,
        user_id: UserId,
        include_archived: bool,
    ) -> Result<Vec<Project>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT * FROM projects
            WHERE user_id = $1 AND (is_archived = false OR $2)
            ORDER BY name
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(include_archived)
        .fetch_all(pool)
        .await
    }

    /// Active projects carrying fingerprint hints
    pub async fn list_with_fingerprints(
        pool: &PgPool,
        user_id: UserId,
    ) -> Result<Vec<Project>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT * FROM projects
            WHERE user_id = $1
              AND is_archived = false
              AND (cardinality(fingerprint_domains) > 0
                OR cardinality(fingerprint_emails) > 0
                OR cardinality(fingerprint_keywords) > 0)
            ORDER BY name
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(pool)
        .await
    }

    /// Partial update; only provided fields change
    pub async fn update(
        pool: &PgPool,
        user_id: UserId,
        id: ProjectId,
        input: UpdateProject,
    ) -> Result<Option<Project>, sqlx::Error> {
        let mut query = String::from("UPDATE projects SET updated_at = NOW()");
        let mut param_count = 2;

        if input.name.is_some() {
            param_count += 1;
            query.push_str(&format!(", name = ${}", param_count));
        }
        if input.short_code.is_some() {
            param_count += 1;
            query.push_str(&format!(", short_code = ${}", param_count));
        }
        if input.client.is_some() {
            param_count += 1;
            query.push_str(&format!(", client = ${}", param_count));
        }
        if input.color.is_some() {
            param_count += 1;
            query.push_str(&format!(", color = ${}", param_count));
        }
        if input.is_billable.is_some() {
            param_count += 1;
            query.push_str(&format!(", is_billable = ${}", param_count));
        }
        if input.is_archived.is_some() {
            param_count += 1;
            query.push_str(&format!(", is_archived = ${}", param_count));
        }
        if input.is_hidden_by_default.is_some() {
            param_count += 1;
            query.push_str(&format!(", is_hidden_by_default = ${}", param_count));
        }
        if input.does_not_accumulate_hours.is_some() {
            param_count += 1;
            query.push_str(&format!(", does_not_accumulate_hours = ${}", param_count));
        }
        if input.fingerprint_domains.is_some() {
            param_count += 1;
            query.push_str(&format!(", fingerprint_domains = ${}", param_count));
        }
        if input.fingerprint_emails.is_some() {
            param_count += 1;
            query.push_str(&format!(", fingerprint_emails = ${}", param_count));
        }
        if input.fingerprint_keywords.is_some() {
            param_count += 1;
            query.push_str(&format!(", fingerprint_keywords = ${}", param_count));
        }

        query.push_str(" WHERE id = $1 AND user_id = $2 RETURNING *");

        let mut q = sqlx::query_as::<_, Project>(&query)
            .bind(id.as_uuid())
            .bind(user_id.as_uuid());

        if let Some(name) = input.name {
            q = q.bind(name);
        }
        if let Some(short_code) = input.short_code {
            q = q.bind(short_code);
        }
        if let Some(client) = input.client {
            q = q.bind(client);
        }
        if let Some(color) = input.color {
            q = q.bind(color);
        }
        if let Some(is_billable) = input.is_billable {
            q = q.bind(is_billable);
        }
        if let Some(is_archived) = input.is_archived {
            q = q.bind(is_archived);
        }
        if let Some(is_hidden) = input.is_hidden_by_default {
            q = q.bind(is_hidden);
        }
        if let Some(no_hours) = input.does_not_accumulate_hours {
            q = q.bind(no_hours);
        }
        if let Some(domains) = input.fingerprint_domains {
            q = q.bind(domains);
        }
        if let Some(emails) = input.fingerprint_emails {
            q = q.bind(emails);
        }
        if let Some(keywords) = input.fingerprint_keywords {
            q = q.bind(keywords);
        }

        q.fetch_optional(pool).await
    }
}
