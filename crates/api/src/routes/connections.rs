//! Google connect flow: consent redirect, callback, connection management.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use db::models::{CalendarProvider, CreateConnection, UpsertCalendar};
use db::{CalendarRepository, ConnectionRepository};
use integrations::GoogleCalendarClient;
use shared::{AppError, DomainError};

use crate::{
    auth::{create_token, verify_token, AuthUser},
    error::{ApiError, ApiResult},
    state::AppState,
    sync,
};

#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    pub id: String,
    pub provider: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub async fn list_connections(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<ConnectionResponse>>> {
    let connections = ConnectionRepository::list_by_user(&state.pool, auth.user_id).await?;

    Ok(Json(
        connections
            .into_iter()
            .map(|c| ConnectionResponse {
                id: c.id.to_string(),
                provider: c.provider.to_string(),
                last_synced_at: c.last_synced_at,
                created_at: c.created_at,
            })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
pub struct ConnectUrlResponse {
    pub authorize_url: String,
}

/// Start the Google consent flow; the state parameter is a short-lived JWT
/// so the callback can recover the user without a cookie.
pub async fn google_connect(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ConnectUrlResponse>> {
    let oauth = state.google_oauth.as_ref().ok_or_else(|| {
        ApiError::from(AppError::Internal("Google OAuth not configured".to_string()))
    })?;

    let state_token = create_token(auth.user_id, &state.config.jwt_secret)
        .map_err(|_| ApiError::from(AppError::Internal("Token creation failed".to_string())))?;

    Ok(Json(ConnectUrlResponse {
        authorize_url: oauth.authorize_url(&state_token),
    }))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub connection_id: String,
    pub calendars_imported: usize,
}

/// OAuth callback: exchange the code, seal the credentials, and import the
/// account's calendar list.
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<Json<CallbackResponse>> {
    let oauth = state.google_oauth.as_ref().ok_or_else(|| {
        ApiError::from(AppError::Internal("Google OAuth not configured".to_string()))
    })?;

    let claims = verify_token(&query.state, &state.config.jwt_secret)
        .map_err(|_| ApiError::from(DomainError::InvalidToken))?;
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::from(DomainError::InvalidToken))?;

    let tokens = oauth
        .exchange_code(&query.code)
        .await
        .map_err(|e| ApiError::from(AppError::ExternalApi(e.to_string())))?;

    let credentials = tokens.into_credentials(None, Utc::now());
    let access_token = credentials.access_token.clone();
    let sealed = state
        .vault
        .seal(&credentials)
        .map_err(|e| ApiError::from(AppError::Internal(format!("Credential seal failed: {}", e))))?;

    let connection = ConnectionRepository::upsert(
        &state.pool,
        CreateConnection {
            user_id,
            provider: CalendarProvider::Google,
            encrypted_credentials: sealed,
        },
    )
    .await?;

    // Import the calendar list right away so selection can happen
    let client = GoogleCalendarClient::new(access_token);
    let provider_calendars = client
        .list_calendars()
        .await
        .map_err(|e| ApiError::from(AppError::ExternalApi(e.to_string())))?;

    let imported = provider_calendars.len();
    for cal in provider_calendars {
        let calendar = CalendarRepository::upsert(
            &state.pool,
            UpsertCalendar {
                connection_id: connection.id,
                user_id,
                external_id: cal.external_id,
                name: cal.name,
                color: cal.color,
                is_primary: cal.is_primary,
            },
        )
        .await?;

        // The primary calendar starts selected
        if calendar.is_primary && !calendar.is_selected {
            CalendarRepository::set_selected(&state.pool, user_id, calendar.id, true).await?;
        }
    }

    Ok(Json(CallbackResponse {
        connection_id: connection.id.to_string(),
        calendars_imported: imported,
    }))
}

/// Refresh the calendar list from the provider
pub async fn refresh_calendars(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<CallbackResponse>> {
    let connection =
        ConnectionRepository::find_by_provider(&state.pool, auth.user_id, CalendarProvider::Google)
            .await?
            .ok_or_else(|| {
                ApiError::from(DomainError::ConnectionNotFound("google".to_string()))
            })?;

    let credentials = sync::connection_credentials(&state, &connection).await?;
    let client = GoogleCalendarClient::new(credentials.access_token);

    let provider_calendars = client
        .list_calendars()
        .await
        .map_err(|e| ApiError::from(AppError::ExternalApi(e.to_string())))?;

    let imported = provider_calendars.len();
    for cal in provider_calendars {
        CalendarRepository::upsert(
            &state.pool,
            UpsertCalendar {
                connection_id: connection.id,
                user_id: auth.user_id,
                external_id: cal.external_id,
                name: cal.name,
                color: cal.color,
                is_primary: cal.is_primary,
            },
        )
        .await?;
    }

    Ok(Json(CallbackResponse {
        connection_id: connection.id.to_string(),
        calendars_imported: imported,
    }))
}

pub async fn delete_connection(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let connection_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid connection ID".to_string())))?;

    let deleted = ConnectionRepository::delete(&state.pool, auth.user_id, connection_id).await?;
    if !deleted {
        return Err(ApiError::from(DomainError::ConnectionNotFound(id)));
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}
