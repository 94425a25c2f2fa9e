/// Run invocation and execution history endpoints

use crate::api::{ApiError, AppState};
use crate::execution::Execution;
use crate::runtime::RunInput;
use crate::tools::ConfigMap;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::{collections::HashMap, time::Duration};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Sync,
    Async,
}

/// Body of `POST /api/workflows/{id}/run`; every field is optional
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub params: ConfigMap,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub timeout_secs: Option<u64>,
}

pub fn create_execution_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows/{id}/run", post(run_workflow))
        .route("/api/workflows/{id}/executions", get(list_executions))
        .route("/api/executions/{id}", get(get_execution))
        .route("/api/executions/{id}/cancel", post(cancel_execution))
}

/// Invoke a workflow as an API call
///
/// POST /api/workflows/{id}/run
/// Sync runs answer 200 with the run report; async runs answer 202 with the pending
/// execution id.
async fn run_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<RunRequest>>,
) -> Result<Response, ApiError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let input = RunInput {
        env: request.env,
        params: request.params,
    };
    tracing::info!("📥 Run request for workflow {} ({:?})", id, request.mode);

    match request.mode {
        RunMode::Sync => {
            let timeout = request.timeout_secs.map(Duration::from_secs);
            let report = state.invoker.run_sync(&id, input, timeout).await?;
            Ok(Json(report).into_response())
        }
        RunMode::Async => {
            let execution = state.invoker.run_async(&id, input).await?;
            let body = json!({
                "execution_id": execution.id,
                "status": execution.status,
            });
            Ok((StatusCode::ACCEPTED, Json(body)).into_response())
        }
    }
}

/// GET /api/executions/{id}
async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Execution>, ApiError> {
    let execution = state.invoker.engine().ledger().get_execution(&id).await?;
    Ok(Json(execution))
}

/// GET /api/workflows/{id}/executions, newest first
async fn list_executions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let executions = state.invoker.engine().ledger().list_executions(&id).await?;
    Ok(Json(json!({ "executions": executions })))
}

/// POST /api/executions/{id}/cancel
async fn cancel_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Execution>, ApiError> {
    let execution = state.invoker.cancel(&id).await?;
    Ok(Json(execution))
}
