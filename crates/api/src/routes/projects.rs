use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use db::models::{CreateProject, Project, UpdateProject};
use db::ProjectRepository;
use shared::{AppError, DomainError};

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub id: String,
    pub name: String,
    pub short_code: Option<String>,
    pub client: Option<String>,
    pub color: String,
    pub is_billable: bool,
    pub is_archived: bool,
    pub is_hidden_by_default: bool,
    pub does_not_accumulate_hours: bool,
    pub fingerprint_domains: Vec<String>,
    pub fingerprint_emails: Vec<String>,
    pub fingerprint_keywords: Vec<String>,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        Self {
            id: project.id.to_string(),
            name: project.name,
            short_code: project.short_code,
            client: project.client,
            color: project.color,
            is_billable: project.is_billable,
            is_archived: project.is_archived,
            is_hidden_by_default: project.is_hidden_by_default,
            does_not_accumulate_hours: project.does_not_accumulate_hours,
            fingerprint_domains: project.fingerprint_domains,
            fingerprint_emails: project.fingerprint_emails,
            fingerprint_keywords: project.fingerprint_keywords,
        }
    }
}

/// Map unique-constraint violations to their machine codes
fn map_project_db_error(err: sqlx::Error, name: &str, short_code: Option<&str>) -> ApiError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.constraint() == Some("projects_user_id_name_key") {
            return ApiError::from(DomainError::DuplicateProjectName(name.to_string()));
        }
        if db_err.constraint() == Some("idx_projects_short_code") {
            return ApiError::from(DomainError::DuplicateShortCode(
                short_code.unwrap_or_default().to_string(),
            ));
        }
    }
    ApiError::from(err)
}

pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListProjectsQuery>,
) -> ApiResult<Json<Vec<ProjectResponse>>> {
    let projects =
        ProjectRepository::list_by_user(&state.pool, auth.user_id, query.include_archived).await?;
    Ok(Json(projects.into_iter().map(ProjectResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub short_code: Option<String>,
    pub client: Option<String>,
    pub color: Option<String>,
    pub is_billable: Option<bool>,
    pub is_hidden_by_default: Option<bool>,
    pub does_not_accumulate_hours: Option<bool>,
    #[serde(default)]
    pub fingerprint_domains: Vec<String>,
    #[serde(default)]
    pub fingerprint_emails: Vec<String>,
    #[serde(default)]
    pub fingerprint_keywords: Vec<String>,
}

pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    if req.name.trim().is_empty() {
        return Err(ApiError::from(AppError::Validation(
            "Project name must not be empty".to_string(),
        )));
    }

    let name = req.name.clone();
    let short_code = req.short_code.clone();

    let project = ProjectRepository::create(
        &state.pool,
        CreateProject {
            user_id: auth.user_id,
            name: req.name,
            short_code: req.short_code,
            client: req.client,
            color: req.color.unwrap_or_else(|| "#6366f1".to_string()),
            is_billable: req.is_billable.unwrap_or(true),
            is_hidden_by_default: req.is_hidden_by_default.unwrap_or(false),
            does_not_accumulate_hours: req.does_not_accumulate_hours.unwrap_or(false),
            fingerprint_domains: req.fingerprint_domains,
            fingerprint_emails: req.fingerprint_emails,
            fingerprint_keywords: req.fingerprint_keywords,
        },
    )
    .await
    .map_err(|e| map_project_db_error(e, &name, short_code.as_deref()))?;

    Ok(Json(project.into()))
}

pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ProjectResponse>> {
    let project_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid project ID".to_string())))?;

    let project = ProjectRepository::find_by_id(&state.pool, auth.user_id, project_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::ProjectNotFound(id)))?;

    Ok(Json(project.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub short_code: Option<Option<String>>,
    pub client: Option<Option<String>>,
    pub color: Option<String>,
    pub is_billable: Option<bool>,
    pub is_archived: Option<bool>,
    pub is_hidden_by_default: Option<bool>,
    pub does_not_accumulate_hours: Option<bool>,
    pub fingerprint_domains: Option<Vec<String>>,
    pub fingerprint_emails: Option<Vec<String>>,
    pub fingerprint_keywords: Option<Vec<String>>,
}

pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    let project_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid project ID".to_string())))?;

    let name = req.name.clone().unwrap_or_default();
    let short_code = req.short_code.clone().flatten();

    let project = ProjectRepository::update(
        &state.pool,
        auth.user_id,
        project_id,
        UpdateProject {
            name: req.name,
            short_code: req.short_code,
            client: req.client,
            color: req.color,
            is_billable: req.is_billable,
            is_archived: req.is_archived,
            is_hidden_by_default: req.is_hidden_by_default,
            does_not_accumulate_hours: req.does_not_accumulate_hours,
            fingerprint_domains: req.fingerprint_domains,
            fingerprint_emails: req.fingerprint_emails,
            fingerprint_keywords: req.fingerprint_keywords,
        },
    )
    .await
    .map_err(|e| map_project_db_error(e, &name, short_code.as_deref()))?
    .ok_or_else(|| ApiError::from(DomainError::ProjectNotFound(id)))?;

    Ok(Json(project.into()))
}

/// Archive a project; history is preserved and new classifications are
/// rejected.
pub async fn archive_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ProjectResponse>> {
    let project_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid project ID".to_string())))?;

    let project = ProjectRepository::update(
        &state.pool,
        auth.user_id,
        project_id,
        UpdateProject {
            is_archived: Some(true),
            ..Default::default()
        },
    )
    .await?
    .ok_or_else(|| ApiError::from(DomainError::ProjectNotFound(id)))?;

    Ok(Json(project.into()))
}
