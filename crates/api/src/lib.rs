pub mod auth;
pub mod classify;
pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod sync;
pub mod timesheet;

pub use config::AppConfig;
pub use error::ApiError;
pub use metrics::init_metrics;
pub use state::AppState;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the application router
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))
        // Prometheus metrics
        .route("/metrics", get(routes::prometheus::metrics))
        // Auth routes
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/validate", get(routes::auth::validate_token))
        .route("/users/me/settings", patch(routes::auth::update_settings))
        // API keys
        .route(
            "/api-keys",
            get(routes::api_keys::list_api_keys).post(routes::api_keys::create_api_key),
        )
        .route("/api-keys/:id", delete(routes::api_keys::delete_api_key))
        // OAuth with PKCE for programmatic clients
        .route("/oauth/authorize", get(routes::oauth_client::authorize))
        .route(
            "/oauth/sessions/:id/approve",
            post(routes::oauth_client::approve_session),
        )
        .route("/oauth/token", post(routes::oauth_client::token))
        // Calendar connections
        .route("/connections", get(routes::connections::list_connections))
        .route(
            "/connections/google/connect",
            get(routes::connections::google_connect),
        )
        .route(
            "/connections/google/callback",
            get(routes::connections::google_callback),
        )
        .route(
            "/connections/:id",
            delete(routes::connections::delete_connection),
        )
        // Calendars
        .route("/calendars", get(routes::calendars::list_calendars))
        .route(
            "/calendars/refresh",
            post(routes::connections::refresh_calendars),
        )
        .route("/calendars/:id", patch(routes::calendars::update_calendar))
        // Sync
        .route("/sync", post(routes::sync::request_sync))
        .route("/sync-jobs", get(routes::sync::list_sync_jobs))
        // Calendar events and classification
        .route("/calendar-events", get(routes::events::list_events))
        .route(
            "/calendar-events/:id/classify",
            post(routes::events::classify_event),
        )
        .route(
            "/calendar-events/:id/suppress",
            post(routes::events::suppress_event),
        )
        // Classification rules
        .route(
            "/rules",
            get(routes::rules::list_rules).post(routes::rules::create_rule),
        )
        .route(
            "/rules/:id",
            patch(routes::rules::update_rule).delete(routes::rules::delete_rule),
        )
        .route("/rules/apply", post(routes::rules::apply_rules))
        // Projects
        .route(
            "/projects",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/projects/:id",
            get(routes::projects::get_project)
                .patch(routes::projects::update_project)
                .delete(routes::projects::archive_project),
        )
        // Time entries (merged ephemeral + materialized view)
        .route(
            "/time-entries",
            get(routes::time_entries::list_time_entries)
                .patch(routes::time_entries::upsert_time_entry),
        )
        .route(
            "/time-entries/suppress",
            post(routes::time_entries::suppress_time_entry),
        )
        .route(
            "/time-entries/:id/pin",
            post(routes::time_entries::pin_time_entry),
        )
        .route(
            "/time-entries/:id",
            delete(routes::time_entries::delete_time_entry),
        )
        // Billing periods
        .route(
            "/billing-periods",
            get(routes::billing_periods::list_billing_periods)
                .post(routes::billing_periods::create_billing_period),
        )
        .route(
            "/billing-periods/:id",
            delete(routes::billing_periods::delete_billing_period),
        )
        // Invoices
        .route(
            "/invoices",
            get(routes::invoices::list_invoices).post(routes::invoices::create_invoice),
        )
        .route(
            "/invoices/:id",
            get(routes::invoices::get_invoice).delete(routes::invoices::delete_invoice),
        )
        .route(
            "/invoices/:id/status",
            post(routes::invoices::update_invoice_status),
        )
        // Config export/import
        .route("/config/export", post(routes::config_io::export_config))
        .route("/config/import", post(routes::config_io::import_config))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
