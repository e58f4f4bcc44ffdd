use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use db::models::CreateApiKey;
use db::ApiKeyRepository;
use shared::AppError;

use crate::{
    auth::{generate_api_key, hash_secret, AuthUser},
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
}

/// Listing shape; never includes the raw key
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: String,
    pub name: String,
    pub key_prefix: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Creation response; the only place the raw key ever appears
#[derive(Debug, Serialize)]
pub struct CreatedApiKeyResponse {
    pub id: String,
    pub name: String,
    pub key: String,
    pub key_prefix: String,
}

pub async fn list_api_keys(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<ApiKeyResponse>>> {
    let keys = ApiKeyRepository::list_by_user(&state.pool, auth.user_id).await?;

    Ok(Json(
        keys.into_iter()
            .map(|k| ApiKeyResponse {
                id: k.id.to_string(),
                name: k.name,
                key_prefix: k.key_prefix,
                last_used_at: k.last_used_at,
                created_at: k.created_at,
            })
            .collect(),
    ))
}

pub async fn create_api_key(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateApiKeyRequest>,
) -> ApiResult<Json<CreatedApiKeyResponse>> {
    if req.name.trim().is_empty() {
        return Err(ApiError::from(AppError::Validation(
            "Key name must not be empty".to_string(),
        )));
    }

    let (raw, prefix) = generate_api_key();
    let key_hash = hash_secret(&raw, &state.config.jwt_secret);

    let key = ApiKeyRepository::create(
        &state.pool,
        CreateApiKey {
            user_id: auth.user_id,
            name: req.name,
            key_hash,
            key_prefix: prefix.clone(),
        },
    )
    .await?;

    Ok(Json(CreatedApiKeyResponse {
        id: key.id.to_string(),
        name: key.name,
        key: raw,
        key_prefix: prefix,
    }))
}

pub async fn delete_api_key(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let key_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid key ID".to_string())))?;

    let deleted = ApiKeyRepository::delete(&state.pool, auth.user_id, key_id).await?;
    if !deleted {
        return Err(ApiError::from(AppError::NotFound(id)));
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}
