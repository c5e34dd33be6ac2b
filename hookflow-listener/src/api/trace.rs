//! Request tracing middleware
//!
//! Logs every delivery with its GitHub identifiers, the final status and the
//! time it took to answer.

use std::time::Instant;

use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};

use crate::github::event::{DELIVERY_HEADER, EVENT_HEADER, HOOK_ID_HEADER};

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

pub async fn trace_delivery(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let headers = request.headers();
    let delivery_id = header(headers, DELIVERY_HEADER).to_string();
    let hook_id = header(headers, HOOK_ID_HEADER).to_string();
    let event = header(headers, EVENT_HEADER).to_string();

    let started = Instant::now();
    let response = next.run(request).await;

    tracing::info!(
        delivery_id = %delivery_id,
        hook_id = %hook_id,
        event = %event,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed = ?started.elapsed(),
        "Request completed"
    );

    response
}
