use axum::extract::State;

use crate::state::AppState;

/// Render Prometheus metrics
pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}
