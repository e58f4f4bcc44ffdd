use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use db::models::{ClassificationRule, CreateRule, UpdateRule};
use db::{EventRepository, ProjectRepository, RuleRepository, UserRepository};
use domain::classify::{Query, QueryError};
use shared::{AppError, DomainError};

use crate::{
    auth::AuthUser,
    classify,
    error::{ApiError, ApiResult},
    state::AppState,
};

fn query_error(err: QueryError) -> ApiError {
    match err {
        QueryError::UnknownField(field) => ApiError::from(DomainError::UnknownField(field)),
        other => ApiError::from(DomainError::BadQuery(other.to_string())),
    }
}

#[derive(Debug, Serialize)]
pub struct RuleResponse {
    pub id: String,
    pub query: String,
    pub project_id: Option<String>,
    pub attended: Option<bool>,
    pub weight: f64,
    pub is_enabled: bool,
}

impl From<ClassificationRule> for RuleResponse {
    fn from(rule: ClassificationRule) -> Self {
        Self {
            id: rule.id.to_string(),
            query: rule.query,
            project_id: rule.project_id.map(|p| p.to_string()),
            attended: rule.attended,
            weight: rule.weight,
            is_enabled: rule.is_enabled,
        }
    }
}

pub async fn list_rules(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<RuleResponse>>> {
    let rules = RuleRepository::list_by_user(&state.pool, auth.user_id).await?;
    Ok(Json(rules.into_iter().map(RuleResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub query: String,
    pub project_id: Option<String>,
    pub attended: Option<bool>,
    pub weight: Option<f64>,
    pub is_enabled: Option<bool>,
}

pub async fn create_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateRuleRequest>,
) -> ApiResult<Json<RuleResponse>> {
    // Reject bad queries at save time, never at evaluation time
    Query::parse(&req.query).map_err(query_error)?;

    let project_id = match &req.project_id {
        Some(pid) => Some(
            pid.parse()
                .map_err(|_| ApiError::from(AppError::Validation("Invalid project ID".to_string())))?,
        ),
        None => None,
    };

    if project_id.is_some() == req.attended.is_some() {
        return Err(ApiError::from(DomainError::ClassifyTargetConflict));
    }

    if let Some(project_id) = project_id {
        let project = ProjectRepository::find_by_id(&state.pool, auth.user_id, project_id)
            .await?
            .ok_or_else(|| {
                ApiError::from(DomainError::ProjectNotFound(project_id.to_string()))
            })?;
        if project.is_archived {
            return Err(ApiError::from(DomainError::ProjectArchived));
        }
    }

    let rule = RuleRepository::create(
        &state.pool,
        CreateRule {
            user_id: auth.user_id,
            query: req.query,
            project_id,
            attended: req.attended,
            weight: req.weight.unwrap_or(1.0),
            is_enabled: req.is_enabled.unwrap_or(true),
        },
    )
    .await?;

    Ok(Json(rule.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRuleRequest {
    pub query: Option<String>,
    pub weight: Option<f64>,
    pub is_enabled: Option<bool>,
}

pub async fn update_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateRuleRequest>,
) -> ApiResult<Json<RuleResponse>> {
    let rule_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid rule ID".to_string())))?;

    if let Some(query) = &req.query {
        Query::parse(query).map_err(query_error)?;
    }

    let rule = RuleRepository::update(
        &state.pool,
        auth.user_id,
        rule_id,
        UpdateRule {
            query: req.query,
            project_id: None,
            attended: None,
            weight: req.weight,
            is_enabled: req.is_enabled,
        },
    )
    .await?
    .ok_or_else(|| ApiError::from(DomainError::RuleNotFound(id)))?;

    Ok(Json(rule.into()))
}

pub async fn delete_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let rule_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid rule ID".to_string())))?;

    let deleted = RuleRepository::delete(&state.pool, auth.user_id, rule_id).await?;
    if !deleted {
        return Err(ApiError::from(DomainError::RuleNotFound(id)));
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct ApplyRulesRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub dry_run: bool,
    /// Reconsider manually classified events too
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct ClassifiedChange {
    pub event_id: String,
    pub project_id: Option<String>,
    pub is_skipped: bool,
}

#[derive(Debug, Serialize)]
pub struct ApplyRulesResponse {
    pub dry_run: bool,
    pub classified: Vec<ClassifiedChange>,
}

/// Re-run all rules over a window. In dry-run mode, reports what would
/// change without mutating; otherwise applies and recomputes downstream
/// time entries.
pub async fn apply_rules(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ApplyRulesRequest>,
) -> ApiResult<Json<ApplyRulesResponse>> {
    let start = Utc.from_utc_datetime(
        &req.start_date.and_hms_opt(0, 0, 0).expect("valid midnight"),
    );
    let end = Utc.from_utc_datetime(
        &req.end_date
            .and_hms_opt(23, 59, 59)
            .expect("valid day end"),
    );

    let user = UserRepository::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::UserNotFound(auth.user_id.to_string())))?;

    let events = EventRepository::list_in_window(&state.pool, user.id, start, end).await?;

    let classified = if req.dry_run {
        classify::preview_rules_for_events(&state, user.id, &events, req.force)
            .await?
            .into_iter()
            .map(|(event_id, project_id, is_skipped)| ClassifiedChange {
                event_id: event_id.to_string(),
                project_id: project_id.map(|p| p.to_string()),
                is_skipped,
            })
            .collect()
    } else {
        classify::apply_rules_to_events(&state, &user, events, req.force)
            .await?
            .into_iter()
            .map(|event| ClassifiedChange {
                event_id: event.id.to_string(),
                project_id: event.project_id.map(|p| p.to_string()),
                is_skipped: event.is_skipped,
            })
            .collect()
    };

    Ok(Json(ApplyRulesResponse {
        dry_run: req.dry_run,
        classified,
    }))
}
