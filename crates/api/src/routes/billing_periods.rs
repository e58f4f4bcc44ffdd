use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use db::models::{BillingPeriod, CreateBillingPeriod};
use db::{BillingPeriodRepository, ProjectRepository};
use shared::types::ProjectId;
use shared::{AppError, DomainError};

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ListBillingPeriodsQuery {
    pub project_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BillingPeriodResponse {
    pub id: String,
    pub project_id: String,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub hourly_rate: Decimal,
}

impl From<BillingPeriod> for BillingPeriodResponse {
    fn from(period: BillingPeriod) -> Self {
        Self {
            id: period.id.to_string(),
            project_id: period.project_id.to_string(),
            starts_on: period.starts_on,
            ends_on: period.ends_on,
            hourly_rate: period.hourly_rate,
        }
    }
}

pub async fn list_billing_periods(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListBillingPeriodsQuery>,
) -> ApiResult<Json<Vec<BillingPeriodResponse>>> {
    let periods = match &query.project_id {
        Some(pid) => {
            let project_id: ProjectId = pid.parse().map_err(|_| {
                ApiError::from(AppError::Validation("Invalid project ID".to_string()))
            })?;
            BillingPeriodRepository::list_by_project(&state.pool, auth.user_id, project_id).await?
        }
        None => BillingPeriodRepository::list_by_user(&state.pool, auth.user_id).await?,
    };

    Ok(Json(
        periods.into_iter().map(BillingPeriodResponse::from).collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CreateBillingPeriodRequest {
    pub project_id: String,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub hourly_rate: Decimal,
}

/// Create a rate period; overlap with an existing period for the project
/// (open ends extend to infinity) is rejected inside the insert
/// transaction.
pub async fn create_billing_period(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateBillingPeriodRequest>,
) -> ApiResult<Json<BillingPeriodResponse>> {
    let project_id: ProjectId = req
        .project_id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid project ID".to_string())))?;

    if let Some(ends_on) = req.ends_on {
        if ends_on < req.starts_on {
            return Err(ApiError::from(DomainError::InvalidDateRange(
                "ends_on is before starts_on".to_string(),
            )));
        }
    }
    if req.hourly_rate < Decimal::ZERO {
        return Err(ApiError::from(AppError::Validation(
            "Hourly rate must not be negative".to_string(),
        )));
    }

    ProjectRepository::find_by_id(&state.pool, auth.user_id, project_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::ProjectNotFound(req.project_id.clone())))?;

    let mut tx = state.pool.begin().await?;

    if BillingPeriodRepository::overlap_exists(
        &mut tx,
        auth.user_id,
        project_id,
        req.starts_on,
        req.ends_on,
        None,
    )
    .await?
    {
        return Err(ApiError::from(DomainError::BillingPeriodOverlap));
    }

    let period = BillingPeriodRepository::insert(
        &mut tx,
        CreateBillingPeriod {
            user_id: auth.user_id,
            project_id,
            starts_on: req.starts_on,
            ends_on: req.ends_on,
            hourly_rate: req.hourly_rate,
        },
    )
    .await?;

    tx.commit().await?;

    Ok(Json(period.into()))
}

pub async fn delete_billing_period(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let period_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid billing period ID".to_string())))?;

    let deleted = BillingPeriodRepository::delete(&state.pool, auth.user_id, period_id).await?;
    if !deleted {
        return Err(ApiError::from(DomainError::BillingPeriodNotFound(id)));
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}
