//! Trigger API Handler
//!
//! Receives GitHub webhook deliveries addressed to a workflow.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};

use crate::api::error::HookResponse;
use crate::github::EventParser;
use crate::service::{EventSink, TriggerError};

/// POST /api/v1alpha1/namespaces/{namespace}/workflows/{name}/hooks
/// Parse, authenticate and dispatch a delivery
pub async fn receive_event(
    State(sink): State<Arc<EventSink>>,
    Path((namespace, name)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> HookResponse {
    let event = match EventParser::parse(&headers, &body) {
        Ok(event) => event,
        Err(e) => return TriggerError::from(e).into(),
    };

    tracing::info!(
        delivery_id = %event.delivery_id,
        hook_id = %event.hook_id,
        event = %event.name,
        repository = %event.repository,
        "Handling event for workflow {}/{}",
        namespace,
        name
    );

    match sink.handle(&namespace, &name, &event).await {
        Ok(trigger) => trigger.into(),
        Err(e) => e.into(),
    }
}
