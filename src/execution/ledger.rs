/// Execution ledger
///
/// All writes to an execution go through here. Each active run gets its own async
/// mutex, so a status change and a node-log upsert for the same run never interleave
/// their read-modify-write, while unrelated runs proceed in parallel. The run's
/// cancellation token is kept alongside the lock.

use crate::error::{EngineError, Result};
use crate::execution::types::{Execution, ExecutionStatus, NodeExecutionLog, TriggerType};
use crate::storage::ExecutionStore;
use crate::workflow::WorkflowDefinition;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone, Default)]
struct ActiveRun {
    lock: Arc<Mutex<()>>,
    token: CancellationToken,
}

pub struct ExecutionLedger {
    store: Arc<dyn ExecutionStore>,
    /// execution_id -> lock and cancellation token
    active: Mutex<HashMap<String, ActiveRun>>,
}

impl ExecutionLedger {
    pub fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Self {
            store,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Persist a new pending execution for `workflow`
    ///
    /// Disabled workflows only accept manual runs.
    pub async fn create_execution(
        &self,
        workflow: &WorkflowDefinition,
        trigger: TriggerType,
    ) -> Result<Execution> {
        if !workflow.enabled && trigger != TriggerType::Manual {
            return Err(EngineError::WorkflowDisabled(workflow.id.clone()));
        }

        let execution = Execution::new(workflow, trigger);
        self.store.insert_execution(&execution).await?;
        self.active
            .lock()
            .await
            .insert(execution.id.clone(), ActiveRun::default());

        info!(
            "📝 Created execution {} for workflow {} ({})",
            execution.id, workflow.id, trigger
        );
        Ok(execution)
    }

    pub async fn get_execution(&self, execution_id: &str) -> Result<Execution> {
        self.store
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| EngineError::ExecutionNotFound(execution_id.to_string()))
    }

    /// Executions of one workflow, newest first
    pub async fn list_executions(&self, workflow_id: &str) -> Result<Vec<Execution>> {
        Ok(self.store.list_executions(workflow_id).await?)
    }

    /// Insert or replace the node's log entry and recompute counters
    pub async fn add_node_log(&self, execution_id: &str, log: NodeExecutionLog) -> Result<()> {
        self.mutate(execution_id, |execution| {
            execution.upsert_node_log(log);
            Ok(())
        })
        .await
    }

    /// Apply a status transition; terminal statuses stamp end time and duration
    pub async fn update_execution_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        error: Option<String>,
    ) -> Result<Execution> {
        self.mutate(execution_id, |execution| {
            execution.transition(status, error)?;
            Ok(execution.clone())
        })
        .await
    }

    /// Mark a non-terminal execution cancelled and signal its in-flight work
    pub async fn cancel_execution(&self, execution_id: &str) -> Result<Execution> {
        let execution = self
            .mutate(execution_id, |execution| {
                execution.transition(
                    ExecutionStatus::Cancelled,
                    Some("execution cancelled".to_string()),
                )?;
                Ok(execution.clone())
            })
            .await?;

        if let Some(run) = self.active.lock().await.get(execution_id) {
            run.token.cancel();
        }
        warn!("⏹️ Execution {} cancelled", execution_id);
        Ok(execution)
    }

    /// Whether the stored status is already `cancelled`
    pub async fn is_cancelled(&self, execution_id: &str) -> Result<bool> {
        Ok(self.get_execution(execution_id).await?.status == ExecutionStatus::Cancelled)
    }

    /// Token that fires when the execution is cancelled
    pub async fn cancellation_token(&self, execution_id: &str) -> CancellationToken {
        self.active_run(execution_id).await.token
    }

    /// Drop the in-memory lock and token once a run has finished
    pub async fn release(&self, execution_id: &str) {
        self.active.lock().await.remove(execution_id);
    }

    async fn active_run(&self, execution_id: &str) -> ActiveRun {
        self.active
            .lock()
            .await
            .entry(execution_id.to_string())
            .or_default()
            .clone()
    }

    /// Load, modify and save one execution under its lock
    async fn mutate<T>(
        &self,
        execution_id: &str,
        apply: impl FnOnce(&mut Execution) -> Result<T>,
    ) -> Result<T> {
        // finished runs have no entry; their record no longer races a walker
        let lock = self
            .active
            .lock()
            .await
            .get(execution_id)
            .map(|run| Arc::clone(&run.lock))
            .unwrap_or_default();
        let _guard = lock.lock().await;

        let mut execution = self.get_execution(execution_id).await?;
        let value = apply(&mut execution)?;
        self.store.save_execution(&execution).await?;
        Ok(value)
    }
}
