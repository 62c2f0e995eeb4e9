use crate::services::MetricsStats;
use crate::state::AppState;
use axum::{extract::State, response::Json};

pub async fn get_metrics(State(state): State<AppState>) -> Json<MetricsStats> {
    Json(state.metrics.get_stats())
}
