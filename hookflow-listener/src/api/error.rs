//! API Responses
//!
//! Every answer of the trigger endpoint is a status code plus a JSON body
//! `{"message": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hookflow_core::dto::hook::MessageBody;

use crate::service::{Trigger, TriggerError};

/// Response of the trigger endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookResponse {
    pub status: StatusCode,
    pub message: String,
}

impl HookResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for HookResponse {
    fn into_response(self) -> Response {
        (self.status, Json(MessageBody::new(self.message))).into_response()
    }
}

impl From<Trigger> for HookResponse {
    fn from(trigger: Trigger) -> Self {
        match trigger {
            Trigger::Acknowledged(message) => HookResponse::new(StatusCode::OK, message),
            Trigger::Created(name) => HookResponse::new(
                StatusCode::CREATED,
                format!("PipelineRun {} has been successfully created", name),
            ),
        }
    }
}

impl From<TriggerError> for HookResponse {
    fn from(err: TriggerError) -> Self {
        let status = match &err {
            TriggerError::InvalidEvent(e) => {
                tracing::warn!("Unable to process incoming request: {}", e);
                StatusCode::BAD_REQUEST
            }
            TriggerError::WorkflowNotFound(_) => StatusCode::NOT_FOUND,
            TriggerError::AccessDenied(_) | TriggerError::Rejected(_) => StatusCode::FORBIDDEN,
            TriggerError::ReadSecret { secret, reason } => {
                tracing::error!("Unable to read webhook secret {}: {}", secret, reason);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => {
                tracing::error!(error = ?err, "Error handling event");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        HookResponse::new(status, err.to_string())
    }
}
