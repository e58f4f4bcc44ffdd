//! Config export/import: projects and rules as one JSON document.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use db::models::{CreateProject, CreateRule, UpdateProject};
use db::{ProjectRepository, RuleRepository};
use domain::classify::Query;

use crate::{auth::AuthUser, error::ApiResult, state::AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub name: String,
    pub short_code: Option<String>,
    pub client: Option<String>,
    pub color: String,
    pub is_billable: bool,
    pub is_hidden_by_default: bool,
    pub does_not_accumulate_hours: bool,
    pub fingerprint_domains: Vec<String>,
    pub fingerprint_emails: Vec<String>,
    pub fingerprint_keywords: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RuleDocument {
    pub query: String,
    /// Project referenced by name so documents move between accounts
    pub project_name: Option<String>,
    pub attended: Option<bool>,
    pub weight: f64,
    pub is_enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub projects: Vec<ProjectDocument>,
    pub rules: Vec<RuleDocument>,
}

pub async fn export_config(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ConfigDocument>> {
    let projects = ProjectRepository::list_by_user(&state.pool, auth.user_id, true).await?;
    let rules = RuleRepository::list_by_user(&state.pool, auth.user_id).await?;

    let project_docs: Vec<ProjectDocument> = projects
        .iter()
        .map(|p| ProjectDocument {
            name: p.name.clone(),
            short_code: p.short_code.clone(),
            client: p.client.clone(),
            color: p.color.clone(),
            is_billable: p.is_billable,
            is_hidden_by_default: p.is_hidden_by_default,
            does_not_accumulate_hours: p.does_not_accumulate_hours,
            fingerprint_domains: p.fingerprint_domains.clone(),
            fingerprint_emails: p.fingerprint_emails.clone(),
            fingerprint_keywords: p.fingerprint_keywords.clone(),
        })
        .collect();

    let rule_docs: Vec<RuleDocument> = rules
        .iter()
        .map(|r| RuleDocument {
            query: r.query.clone(),
            project_name: r
                .project_id
                .and_then(|pid| projects.iter().find(|p| p.id == pid))
                .map(|p| p.name.clone()),
            attended: r.attended,
            weight: r.weight,
            is_enabled: r.is_enabled,
        })
        .collect();

    Ok(Json(ConfigDocument {
        projects: project_docs,
        rules: rule_docs,
    }))
}

#[derive(Debug, Serialize)]
pub struct ImportResult {
    pub projects_created: usize,
    pub projects_updated: usize,
    pub rules_created: usize,
    pub rules_skipped: usize,
}

/// Import a config document: projects upsert by name, rules append.
/// Rules with unparseable queries or unknown project names are skipped
/// and counted rather than failing the whole import.
pub async fn import_config(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(doc): Json<ConfigDocument>,
) -> ApiResult<Json<ImportResult>> {
    let mut result = ImportResult {
        projects_created: 0,
        projects_updated: 0,
        rules_created: 0,
        rules_skipped: 0,
    };

    for project in doc.projects {
        match ProjectRepository::find_by_name(&state.pool, auth.user_id, &project.name).await? {
            Some(existing) => {
                ProjectRepository::update(
                    &state.pool,
                    auth.user_id,
                    existing.id,
                    UpdateProject {
                        short_code: Some(project.short_code),
                        client: Some(project.client),
                        color: Some(project.color),
                        is_billable: Some(project.is_billable),
                        is_hidden_by_default: Some(project.is_hidden_by_default),
                        does_not_accumulate_hours: Some(project.does_not_accumulate_hours),
                        fingerprint_domains: Some(project.fingerprint_domains),
                        fingerprint_emails: Some(project.fingerprint_emails),
                        fingerprint_keywords: Some(project.fingerprint_keywords),
                        ..Default::default()
                    },
                )
                .await?;
                result.projects_updated += 1;
            }
            None => {
                ProjectRepository::create(
                    &state.pool,
                    CreateProject {
                        user_id: auth.user_id,
                        name: project.name,
                        short_code: project.short_code,
                        client: project.client,
                        color: project.color,
                        is_billable: project.is_billable,
                        is_hidden_by_default: project.is_hidden_by_default,
                        does_not_accumulate_hours: project.does_not_accumulate_hours,
                        fingerprint_domains: project.fingerprint_domains,
                        fingerprint_emails: project.fingerprint_emails,
                        fingerprint_keywords: project.fingerprint_keywords,
                    },
                )
                .await?;
                result.projects_created += 1;
            }
        }
    }

    for rule in doc.rules {
        if Query::parse(&rule.query).is_err() {
            result.rules_skipped += 1;
            continue;
        }

        let project_id = match &rule.project_name {
            Some(name) => {
                match ProjectRepository::find_by_name(&state.pool, auth.user_id, name).await? {
                    Some(project) => Some(project.id),
                    None => {
                        result.rules_skipped += 1;
                        continue;
                    }
                }
            }
            None => None,
        };

        if project_id.is_some() == rule.attended.is_some() {
            result.rules_skipped += 1;
            continue;
        }

        RuleRepository::create(
            &state.pool,
            CreateRule {
                user_id: auth.user_id,
                query: rule.query,
                project_id,
                attended: rule.attended,
                weight: rule.weight,
                is_enabled: rule.is_enabled,
            },
        )
        .await?;
        result.rules_created += 1;
    }

    Ok(Json(result))
}
