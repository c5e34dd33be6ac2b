//! API Module
//!
//! HTTP API layer for the trigger listener.

pub mod error;
pub mod health;
pub mod hooks;
pub mod trace;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::service::EventSink;

/// Path GitHub webhooks deliver to
pub const HOOKS_PATH: &str = "/api/v1alpha1/namespaces/{namespace}/workflows/{name}/hooks";

/// Create the main API router with all endpoints
pub fn create_router(sink: Arc<EventSink>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // GitHub deliveries
        .route(
            HOOKS_PATH,
            post(hooks::receive_event).layer(middleware::from_fn(trace::trace_delivery)),
        )
        // Add state and middleware
        .with_state(sink)
        .layer(TraceLayer::new_for_http())
}
