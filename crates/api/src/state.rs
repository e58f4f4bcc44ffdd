use std::sync::Arc;

use integrations::{CredentialVault, GoogleOAuthClient};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;

use crate::config::AppConfig;

/// Application state shared across all handlers and background tasks
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub vault: Arc<CredentialVault>,
    pub google_oauth: Option<Arc<GoogleOAuthClient>>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig, metrics_handle: PrometheusHandle) -> Self {
        let vault = CredentialVault::from_base64_key(&config.encryption_key)
            .expect("TIMESHEET_ENCRYPTION_KEY must be a 32-byte base64 key");

        let google_oauth = config.google.as_ref().map(|g| {
            Arc::new(GoogleOAuthClient::new(
                g.client_id.clone(),
                g.client_secret.clone(),
                g.redirect_url.clone(),
            ))
        });

        Self {
            pool,
            config: Arc::new(config),
            vault: Arc::new(vault),
            google_oauth,
            metrics_handle,
        }
    }
}
