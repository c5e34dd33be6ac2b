//! Health Check API Handler

use axum::{Json, http::StatusCode, response::IntoResponse};
use hookflow_core::dto::hook::MessageBody;

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(MessageBody::new("Event listener is alive")))
}
