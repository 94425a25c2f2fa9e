//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use autoforge::api::AppState;
use autoforge::config::Config;
use autoforge::execution::Execution;
use autoforge::server::build_state;
use autoforge::storage::{MemoryStore, WorkflowRepository};
use autoforge::tools::{
    ConfigMap, ConfigSchema, ExecutionContext, ExecutionResult, Tool, ToolError, ToolMetadata,
};
use autoforge::WorkflowDefinition;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};

/// Echoes its resolved configuration back as output
pub struct RecordTool {
    metadata: ToolMetadata,
    schema: ConfigSchema,
}

impl RecordTool {
    pub fn new() -> Self {
        Self {
            metadata: ToolMetadata {
                code: "record".into(),
                name: "Record".into(),
                category: "testing".into(),
                ..Default::default()
            },
            schema: ConfigSchema::default(),
        }
    }
}

#[async_trait]
impl Tool for RecordTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> &ConfigSchema {
        &self.schema
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        config: &ConfigMap,
    ) -> Result<ExecutionResult, ToolError> {
        if config.get("panic") == Some(&json!(true)) {
            panic!("record tool asked to panic");
        }
        if config.get("fail") == Some(&json!(true)) {
            return Ok(ExecutionResult::failed("record refused", "E_REFUSED"));
        }
        Ok(ExecutionResult::succeeded("recorded", config.clone()))
    }
}

/// Sleeps for `ms` milliseconds unless the run is cancelled first
pub struct SlowTool {
    metadata: ToolMetadata,
    schema: ConfigSchema,
}

impl SlowTool {
    pub fn new() -> Self {
        Self {
            metadata: ToolMetadata {
                code: "slow".into(),
                name: "Slow".into(),
                category: "testing".into(),
                ..Default::default()
            },
            schema: ConfigSchema::default(),
        }
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> &ConfigSchema {
        &self.schema
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        config: &ConfigMap,
    ) -> Result<ExecutionResult, ToolError> {
        let ms = config.get("ms").and_then(Value::as_u64).unwrap_or(5_000);
        let mut output = ConfigMap::new();

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ms)) => {
                output.insert("interrupted".into(), json!(false));
            }
            _ = ctx.cancellation.cancelled() => {
                output.insert("interrupted".into(), json!(true));
            }
        }
        Ok(ExecutionResult::succeeded("slept", output))
    }
}

pub fn config(max_concurrent_runs: usize) -> Config {
    let mut config = Config::default();
    config.runtime.max_concurrent_runs = max_concurrent_runs;
    config.runtime.webhook_timeout_secs = 5;
    config
}

/// Fully wired services over a fresh in-memory store with the test tools registered
pub async fn harness(max_concurrent_runs: usize) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = build_state(&config(max_concurrent_runs), store.clone())
        .await
        .unwrap();
    state.tools.register(Arc::new(RecordTool::new())).await.unwrap();
    state.tools.register(Arc::new(SlowTool::new())).await.unwrap();
    (state, store)
}

pub fn workflow(value: Value) -> WorkflowDefinition {
    serde_json::from_value(value).unwrap()
}

pub async fn save(store: &dyn WorkflowRepository, value: Value) -> WorkflowDefinition {
    let workflow = workflow(value);
    store.save_workflow(&workflow).await.unwrap();
    workflow
}

/// Poll an execution until `predicate` holds, panicking after five seconds
pub async fn wait_for(
    state: &AppState,
    execution_id: &str,
    predicate: impl Fn(&Execution) -> bool,
) -> Execution {
    let ledger = state.invoker.engine().ledger();
    for _ in 0..500 {
        let execution = ledger.get_execution(execution_id).await.unwrap();
        if predicate(&execution) {
            return execution;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("execution {} never reached the expected state", execution_id);
}
