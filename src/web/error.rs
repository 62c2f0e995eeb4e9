//! HTTP mapping for chat errors

use crate::types::ChatError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = match &self {
            ChatError::Formatting(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ChatError::Spawn(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!("Chat request rejected ({}): {}", status, self);
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
