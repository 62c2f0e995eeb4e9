use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // API endpoints
        .route("/api/chat", post(super::handlers::chat::stream_chat))
        .route("/api/metrics", get(super::handlers::metrics::get_metrics))

        // Health check
        .route("/health", get(super::handlers::health::health_check))

        .with_state(state)
}
