/// Workflow run orchestration
///
/// Drives one execution from `pending` to a terminal status: orders the graph,
/// walks the nodes one at a time, feeds each node's output to later placeholders and
/// records every step in the ledger.

use crate::error::{EngineError, Result};
use crate::execution::{Execution, ExecutionLedger, ExecutionStatus, NodeExecutionLog};
use crate::runtime::dag::topological_order;
use crate::runtime::executor::{NodeExecutor, NodeRunScope};
use crate::runtime::variables::{build_env_map, NodeOutputs};
use crate::storage::WorkflowRepository;
use crate::tools::{ConfigMap, ToolRegistry};
use crate::workflow::{NodeKind, WorkflowDefinition};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};

/// Reason recorded on nodes skipped after a false condition
pub const CONDITION_SKIP_REASON: &str = "condition evaluated to false, skipping";

/// Caller-supplied values for one run
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunInput {
    /// Overrides for definition env vars
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// External parameters, reachable as `{{external.KEY}}`
    #[serde(default)]
    pub params: ConfigMap,
}

pub struct WorkflowEngine {
    workflows: Arc<dyn WorkflowRepository>,
    ledger: Arc<ExecutionLedger>,
    executor: NodeExecutor,
}

impl WorkflowEngine {
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        ledger: Arc<ExecutionLedger>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        let executor = NodeExecutor::new(registry, Arc::clone(&ledger));
        Self {
            workflows,
            ledger,
            executor,
        }
    }

    pub fn ledger(&self) -> &Arc<ExecutionLedger> {
        &self.ledger
    }

    pub fn workflows(&self) -> &Arc<dyn WorkflowRepository> {
        &self.workflows
    }

    /// Run a pending execution to completion
    ///
    /// Returns the final execution on success. A failed run returns the first node
    /// error (or the graph error) and a cancelled run returns `Cancelled`; in both
    /// cases the ledger already holds the terminal record.
    #[tracing::instrument(name = "workflow_run", skip(self, input))]
    pub async fn run(&self, execution_id: &str, input: RunInput) -> Result<Execution> {
        let result = self.drive(execution_id, &input).await;
        self.ledger.release(execution_id).await;
        result
    }

    async fn drive(&self, execution_id: &str, input: &RunInput) -> Result<Execution> {
        let execution = self.ledger.get_execution(execution_id).await?;
        let workflow = match self.workflows.get_workflow(&execution.workflow_id).await? {
            Some(workflow) => workflow,
            None => {
                let error = EngineError::WorkflowNotFound(execution.workflow_id.clone());
                self.ledger
                    .update_execution_status(execution_id, ExecutionStatus::Failed, Some(error.to_string()))
                    .await?;
                return Err(error);
            }
        };

        if let Err(e) = self
            .ledger
            .update_execution_status(execution_id, ExecutionStatus::Running, None)
            .await
        {
            if matches!(e, EngineError::InvalidTransition { .. })
                && self.ledger.is_cancelled(execution_id).await?
            {
                tracing::info!("⏹️ Execution {} was cancelled before it started", execution_id);
                return Err(EngineError::Cancelled(execution_id.to_string()));
            }
            return Err(e);
        }

        tracing::info!(
            "🚀 Starting workflow execution: {} ({} nodes, {} edges)",
            workflow.id,
            workflow.nodes.len(),
            workflow.edges.len()
        );
        let started = std::time::Instant::now();

        let order = match topological_order(&workflow.nodes, &workflow.edges) {
            Ok(order) => order,
            Err(e) => {
                self.finish(&workflow, execution_id, ExecutionStatus::Failed, Some(e.to_string()))
                    .await?;
                return Err(e);
            }
        };

        let env = build_env_map(&workflow.env_vars, &input.env, &input.params);
        let cancellation = self.ledger.cancellation_token(execution_id).await;
        let mut outputs = NodeOutputs::new();
        let mut gate_closed = false;
        let mut cancelled = false;
        let mut failure: Option<EngineError> = None;

        for (step, node) in order.iter().enumerate() {
            if self.ledger.is_cancelled(execution_id).await? {
                tracing::info!("⏹️ Execution {} cancelled before node {}", execution_id, node.id);
                cancelled = true;
                break;
            }

            if gate_closed {
                tracing::info!("⏭️ Skipping node '{}' after false condition", node.id);
                self.record(execution_id, NodeExecutionLog::skipped(node, CONDITION_SKIP_REASON))
                    .await;
                continue;
            }

            tracing::info!(
                "📍 Step {}/{}: Executing node '{}' (type: {})",
                step + 1,
                order.len(),
                node.id,
                node.kind
            );

            let outcome = {
                let scope = NodeRunScope {
                    execution_id,
                    env: &env,
                    outputs: &outputs,
                    external: &input.params,
                    cancellation: cancellation.clone(),
                };
                self.executor.execute(node, &scope).await
            };
            self.record(execution_id, outcome.log).await;

            if let Some(error) = outcome.error {
                failure = Some(error);
                break;
            }

            if node.kind == NodeKind::Condition
                && outcome.output.get("result") == Some(&Value::Bool(false))
            {
                tracing::info!("🚧 Condition '{}' is false, remaining nodes will be skipped", node.id);
                gate_closed = true;
            }
            outputs.insert(&node.id, outcome.output);
        }

        let (status, error) = if cancelled {
            (ExecutionStatus::Cancelled, None)
        } else if let Some(e) = &failure {
            (ExecutionStatus::Failed, Some(e.to_string()))
        } else {
            (ExecutionStatus::Success, None)
        };

        let final_status = self.finish(&workflow, execution_id, status, error).await?;
        match (final_status, failure) {
            (ExecutionStatus::Cancelled, _) => {
                tracing::warn!("⏹️ Workflow '{}' cancelled after {:?}", workflow.id, started.elapsed());
                Err(EngineError::Cancelled(execution_id.to_string()))
            }
            (_, Some(e)) => {
                tracing::error!("❌ Workflow '{}' failed after {:?}: {}", workflow.id, started.elapsed(), e);
                Err(e)
            }
            _ => {
                tracing::info!(
                    "🎉 Workflow '{}' execution completed successfully in {:?}",
                    workflow.id,
                    started.elapsed()
                );
                self.ledger.get_execution(execution_id).await
            }
        }
    }

    /// Apply the terminal status and account the run in the workflow stats
    ///
    /// Returns the status the execution actually ended in; a cancel that lands while
    /// the last node is running wins over success or failure.
    async fn finish(
        &self,
        workflow: &WorkflowDefinition,
        execution_id: &str,
        status: ExecutionStatus,
        error: Option<String>,
    ) -> Result<ExecutionStatus> {
        let final_status = if status == ExecutionStatus::Cancelled {
            status
        } else {
            match self
                .ledger
                .update_execution_status(execution_id, status, error)
                .await
            {
                Ok(_) => status,
                Err(EngineError::InvalidTransition { .. }) => {
                    self.ledger.get_execution(execution_id).await?.status
                }
                Err(e) => return Err(e),
            }
        };

        if let Err(e) = self
            .workflows
            .record_run(&workflow.id, final_status, Utc::now())
            .await
        {
            tracing::error!("❌ Failed to update stats for workflow {}: {}", workflow.id, e);
        }
        Ok(final_status)
    }

    async fn record(&self, execution_id: &str, log: NodeExecutionLog) {
        let node_id = log.node_id.clone();
        if let Err(e) = self.ledger.add_node_log(execution_id, log).await {
            tracing::error!("❌ Failed to record log for node {}: {}", node_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{NodeStatus, TriggerType};
    use crate::storage::MemoryStore;
    use serde_json::json;

    async fn setup(definition: Value) -> (WorkflowEngine, Arc<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::new());
        let workflow: WorkflowDefinition = serde_json::from_value(definition).unwrap();
        store.save_workflow(&workflow).await.unwrap();

        let ledger = Arc::new(ExecutionLedger::new(store.clone()));
        let execution = ledger
            .create_execution(&workflow, TriggerType::Manual)
            .await
            .unwrap();
        let engine = WorkflowEngine::new(store.clone(), ledger, Arc::new(ToolRegistry::new()));
        (engine, store, execution.id)
    }

    #[tokio::test]
    async fn test_false_condition_skips_rest() {
        let (engine, store, execution_id) = setup(json!({
            "id": "wf", "name": "wf",
            "nodes": [
                {"id": "start", "type": "trigger"},
                {"id": "check", "type": "condition",
                 "config": {"conditionType": "simple", "field": "start.triggered", "operator": "==", "value": false}},
                {"id": "after", "type": "switch"}
            ],
            "edges": [{"source": "start", "target": "check"}, {"source": "check", "target": "after"}]
        }))
        .await;

        let execution = engine.run(&execution_id, RunInput::default()).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Success);
        assert_eq!(execution.success_nodes, 2);
        assert_eq!(execution.skipped_nodes, 1);
        let skipped = execution.node_log("after").unwrap();
        assert_eq!(skipped.status, NodeStatus::Skipped);
        assert_eq!(skipped.output["reason"], CONDITION_SKIP_REASON);

        let workflow = store.get_workflow("wf").await.unwrap().unwrap();
        assert_eq!(workflow.stats.success_executions, 1);
    }

    #[tokio::test]
    async fn test_cycle_fails_the_run() {
        let (engine, store, execution_id) = setup(json!({
            "id": "wf", "name": "wf",
            "nodes": [{"id": "a", "type": "trigger"}, {"id": "b", "type": "trigger"}],
            "edges": [{"source": "a", "target": "b"}, {"source": "b", "target": "a"}]
        }))
        .await;

        let err = engine.run(&execution_id, RunInput::default()).await.unwrap_err();
        assert_eq!(err.code(), "CYCLE_DETECTED");

        let execution = engine.ledger().get_execution(&execution_id).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.node_logs.is_empty());
        let workflow = store.get_workflow("wf").await.unwrap().unwrap();
        assert_eq!(workflow.stats.failed_executions, 1);
    }

    #[tokio::test]
    async fn test_cancelled_while_pending() {
        let (engine, store, execution_id) = setup(json!({
            "id": "wf", "name": "wf", "nodes": [{"id": "a", "type": "trigger"}]
        }))
        .await;
        engine.ledger().cancel_execution(&execution_id).await.unwrap();

        let err = engine.run(&execution_id, RunInput::default()).await.unwrap_err();
        assert_eq!(err.code(), "CANCELLED");
        let workflow = store.get_workflow("wf").await.unwrap().unwrap();
        assert_eq!(workflow.stats.total_executions, 0);
    }

    #[tokio::test]
    async fn test_node_failure_stops_walk() {
        let (engine, _store, execution_id) = setup(json!({
            "id": "wf", "name": "wf",
            "nodes": [
                {"id": "a", "type": "trigger"},
                {"id": "b", "type": "tool", "toolCode": "missing", "config": {"x": 1}},
                {"id": "c", "type": "trigger"}
            ],
            "edges": [{"source": "a", "target": "b"}, {"source": "b", "target": "c"}]
        }))
        .await;

        let err = engine.run(&execution_id, RunInput::default()).await.unwrap_err();
        assert_eq!(err.code(), "TOOL_NOT_FOUND");

        let execution = engine.ledger().get_execution(&execution_id).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.error.as_deref(), Some("tool not found: missing"));
        assert_eq!(execution.success_nodes, 1);
        assert_eq!(execution.failed_nodes, 1);
        assert!(execution.node_log("c").is_none());
    }
}
