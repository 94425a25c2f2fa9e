/// HTTP API Layer
///
/// Thin axum routes over the invocation layer, scheduler and tool registry. Handlers
/// return `ApiError`, which maps engine errors onto status codes with a JSON
/// `{error, code}` body.

use crate::error::EngineError;
use crate::runtime::{Invoker, Scheduler};
use crate::tools::ToolRegistry;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::json;
use std::sync::Arc;

// Run invocation, execution history and cancellation endpoints
pub mod executions;

// Workflow definition, scheduler and tool catalogue endpoints
pub mod workflows;

pub use executions::create_execution_routes;
pub use workflows::create_workflow_routes;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub invoker: Arc<Invoker>,
    pub scheduler: Arc<Scheduler>,
    pub tools: Arc<ToolRegistry>,
}

/// Full router: health check plus every API route
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .merge(create_workflow_routes())
        .merge(create_execution_routes())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}

/// Engine error carried to the HTTP boundary
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        Self(error)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        Self(EngineError::Storage(error))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            EngineError::WorkflowNotFound(_)
            | EngineError::ExecutionNotFound(_)
            | EngineError::ToolNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::WorkflowDisabled(_)
            | EngineError::InvalidParam { .. }
            | EngineError::Definition(_)
            | EngineError::CycleDetected { .. }
            | EngineError::ScheduleParse { .. } => StatusCode::BAD_REQUEST,
            EngineError::InvalidTransition { .. } => StatusCode::CONFLICT,
            EngineError::Overloaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("❌ Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self.0);
        }

        let body = json!({ "error": self.0.to_string(), "code": self.0.code() });
        (status, Json(body)).into_response()
    }
}
