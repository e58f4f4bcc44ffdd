use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use db::models::CreateUser;
use db::UserRepository;
use shared::DomainError;

use crate::{
    auth::{create_token, AuthUser},
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1))]
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()
        .map_err(|e| ApiError::from(shared::AppError::Validation(e.to_string())))?;

    if UserRepository::find_by_email(&state.pool, &req.email)
        .await?
        .is_some()
    {
        return Err(ApiError::from(DomainError::EmailAlreadyExists));
    }

    // Hash password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|_| {
            ApiError::from(shared::AppError::Internal(
                "Password hashing failed".to_string(),
            ))
        })?
        .to_string();

    let user = UserRepository::create(
        &state.pool,
        CreateUser {
            email: req.email,
            display_name: req.display_name,
            password_hash,
        },
    )
    .await?;

    let token = create_token(user.id, &state.config.jwt_secret)
        .map_err(|_| ApiError::from(shared::AppError::Internal("Token creation failed".to_string())))?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse {
            id: user.id.to_string(),
            email: user.email,
            display_name: user.display_name,
        },
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = UserRepository::find_by_email(&state.pool, &req.email)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::InvalidCredentials))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| ApiError::from(DomainError::InvalidCredentials))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::from(DomainError::InvalidCredentials))?;

    let token = create_token(user.id, &state.config.jwt_secret)
        .map_err(|_| ApiError::from(shared::AppError::Internal("Token creation failed".to_string())))?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse {
            id: user.id.to_string(),
            email: user.email,
            display_name: user.display_name,
        },
    }))
}

pub async fn validate_token(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<UserResponse>> {
    let user = UserRepository::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::UserNotFound(auth.user_id.to_string())))?;

    Ok(Json(UserResponse {
        id: user.id.to_string(),
        email: user.email,
        display_name: user.display_name,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub rounding_granularity: i64,
    pub rounding_threshold: i64,
}

/// Update the rounding knobs used by time-entry computation
pub async fn update_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.rounding_granularity < 1 || req.rounding_threshold < 1 {
        return Err(ApiError::from(shared::AppError::Validation(
            "Rounding values must be positive".to_string(),
        )));
    }
    if req.rounding_threshold > req.rounding_granularity {
        return Err(ApiError::from(shared::AppError::Validation(
            "Threshold must not exceed granularity".to_string(),
        )));
    }

    UserRepository::update_rounding(
        &state.pool,
        auth.user_id,
        req.rounding_granularity,
        req.rounding_threshold,
    )
    .await?;

    Ok(Json(serde_json::json!({
        "rounding_granularity": req.rounding_granularity,
        "rounding_threshold": req.rounding_threshold,
    })))
}
