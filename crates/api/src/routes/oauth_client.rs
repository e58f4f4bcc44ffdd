//! OAuth authorization-code flow with PKCE (S256) for programmatic
//! clients. Sessions live 10 minutes, codes 5, bearer tokens 24 hours.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use db::models::CreateOauthSession;
use db::OauthRepository;
use shared::{AppError, DomainError};

use crate::{
    auth::{generate_secret, hash_secret, s256_challenge, AuthUser},
    error::{ApiError, ApiResult},
    state::AppState,
};

const SESSION_TTL_MINUTES: i64 = 10;
const CODE_TTL_MINUTES: i64 = 5;
const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub client_name: String,
    pub code_challenge: String,
    #[serde(default = "default_method")]
    pub code_challenge_method: String,
    pub redirect_uri: String,
}

fn default_method() -> String {
    "S256".to_string()
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub session_id: String,
    pub client_name: String,
    pub expires_at: String,
}

/// Start an authorization session. The (out-of-scope) UI shows this
/// session to the user for approval.
pub async fn authorize(
    State(state): State<AppState>,
    Query(req): Query<AuthorizeQuery>,
) -> ApiResult<Json<AuthorizeResponse>> {
    if req.code_challenge_method != "S256" {
        return Err(ApiError::from(AppError::Validation(
            "Only S256 code challenges are supported".to_string(),
        )));
    }
    if req.code_challenge.is_empty() || req.client_name.is_empty() {
        return Err(ApiError::from(AppError::Validation(
            "client_name and code_challenge are required".to_string(),
        )));
    }

    let session = OauthRepository::create_session(
        &state.pool,
        CreateOauthSession {
            client_name: req.client_name,
            code_challenge: req.code_challenge,
            redirect_uri: req.redirect_uri,
            expires_at: Utc::now() + Duration::minutes(SESSION_TTL_MINUTES),
        },
    )
    .await?;

    Ok(Json(AuthorizeResponse {
        session_id: session.id.to_string(),
        client_name: session.client_name,
        expires_at: session.expires_at.to_rfc3339(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub code: String,
    pub redirect_uri: String,
}

/// The logged-in user approves a pending session; returns the one-time
/// authorization code for the client.
pub async fn approve_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApproveResponse>> {
    let session_id: uuid::Uuid = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid session ID".to_string())))?;

    let session = OauthRepository::find_session(&state.pool, session_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::TokenExpired))?;

    let code = generate_secret("code_");
    let code_hash = hash_secret(&code, &state.config.jwt_secret);

    OauthRepository::authorize_session(
        &state.pool,
        session.id,
        auth.user_id,
        &code_hash,
        Utc::now() + Duration::minutes(CODE_TTL_MINUTES),
    )
    .await?
    .ok_or_else(|| ApiError::from(DomainError::TokenExpired))?;

    Ok(Json(ApproveResponse {
        code,
        redirect_uri: session.redirect_uri,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub code: String,
    pub code_verifier: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Exchange an authorization code + PKCE verifier for a bearer token
pub async fn token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let code_hash = hash_secret(&req.code, &state.config.jwt_secret);

    let session = OauthRepository::find_session_by_code_hash(&state.pool, &code_hash)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::InvalidToken))?;

    // PKCE: the verifier must hash to the challenge from the authorize step
    if s256_challenge(&req.code_verifier) != session.code_challenge {
        return Err(ApiError::from(DomainError::InvalidToken));
    }

    let user_id = session
        .user_id
        .ok_or_else(|| ApiError::from(DomainError::InvalidToken))?;

    // Codes are single-use
    OauthRepository::delete_session(&state.pool, session.id).await?;

    let access_token = generate_secret("ts_");
    let token_hash = hash_secret(&access_token, &state.config.jwt_secret);

    OauthRepository::insert_token(
        &state.pool,
        user_id,
        &token_hash,
        &session.client_name,
        Utc::now() + Duration::hours(TOKEN_TTL_HOURS),
    )
    .await?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: TOKEN_TTL_HOURS * 3600,
    }))
}
