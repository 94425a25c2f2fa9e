/// Workflow definition, scheduler and tool catalogue endpoints
///
/// Saving a definition validates it, persists it and signals the scheduler, which
/// rebuilds its job set in the background. Runs already in flight keep the
/// definition they started with.

use crate::api::{ApiError, AppState};
use crate::error::EngineError;
use crate::execution::Execution;
use crate::runtime::ReloadReport;
use crate::workflow::{extract_external_trigger_params, validate_definition, WorkflowDefinition};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct ToolQuery {
    pub category: Option<String>,
    #[serde(default)]
    pub ai_callable: bool,
}

pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows/{id}", get(get_workflow).put(save_workflow))
        .route("/api/workflows/{id}/schedule", get(get_schedule))
        .route("/api/workflows/{id}/trigger", post(trigger_workflow))
        .route("/api/scheduler/reload", post(reload_scheduler))
        .route("/api/tools", get(list_tools))
}

/// GET /api/workflows/{id}
async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowDefinition>, ApiError> {
    let workflow = state
        .invoker
        .engine()
        .workflows()
        .get_workflow(&id)
        .await?
        .ok_or(EngineError::WorkflowNotFound(id))?;
    Ok(Json(workflow))
}

/// Create or replace a workflow
///
/// PUT /api/workflows/{id}
/// Body: the workflow definition; its id is taken from the path. Parameters declared
/// on an external trigger start node replace `api.params`.
async fn save_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut workflow): Json<WorkflowDefinition>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    workflow.id = id;
    validate_definition(&workflow).map_err(EngineError::from)?;

    let declared = extract_external_trigger_params(&workflow.nodes, &workflow.edges);
    if !declared.is_empty() {
        workflow.api.params = declared;
    }

    state
        .invoker
        .engine()
        .workflows()
        .save_workflow(&workflow)
        .await?;
    state.scheduler.notify_changed();

    tracing::info!("🔥 Saved workflow: {} ({})", workflow.id, workflow.name);
    Ok((
        StatusCode::OK,
        Json(json!({
            "id": workflow.id,
            "message": format!("Workflow '{}' saved", workflow.name),
        })),
    ))
}

/// GET /api/workflows/{id}/schedule
async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let scheduled = state.scheduler.is_scheduled(&id).await;
    let next_run = state.scheduler.next_run(&id).await?;
    Ok(Json(json!({
        "workflow_id": id,
        "scheduled": scheduled,
        "next_run": next_run,
    })))
}

/// Run a workflow now, outside its schedule
///
/// POST /api/workflows/{id}/trigger
async fn trigger_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Execution>), ApiError> {
    let execution = state.scheduler.run_now(&id).await?;
    Ok((StatusCode::ACCEPTED, Json(execution)))
}

/// POST /api/scheduler/reload
async fn reload_scheduler(State(state): State<AppState>) -> Result<Json<ReloadReport>, ApiError> {
    let report = state.scheduler.reload_all().await?;
    Ok(Json(report))
}

/// GET /api/tools?category=...&ai_callable=true
async fn list_tools(State(state): State<AppState>, Query(query): Query<ToolQuery>) -> Json<Value> {
    let tools = match (&query.category, query.ai_callable) {
        (Some(category), _) => state.tools.list_by_category(category).await,
        (None, true) => state.tools.list_ai_callable().await,
        (None, false) => state.tools.list().await,
    };
    Json(json!({ "tools": tools, "count": tools.len() }))
}
