/// Invocation layer
///
/// Every run, whatever started it, enters here: admission through the run gate,
/// API parameter checks, execution creation, then the engine on its own task.
/// Synchronous callers wait under a deadline; asynchronous callers get the pending
/// execution back immediately and, for API runs, a webhook when it finishes.

use crate::error::{EngineError, Result};
use crate::execution::{Execution, ExecutionStatus, TriggerType};
use crate::runtime::engine::{RunInput, WorkflowEngine};
use crate::runtime::webhook::WebhookNotifier;
use crate::tools::ConfigMap;
use crate::workflow::{apply_api_params, WorkflowDefinition};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded admission for concurrent runs; rejects instead of queueing
#[derive(Debug, Clone)]
pub struct RunGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl RunGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Take a slot or fail with `Overloaded`; the slot frees when the permit drops
    pub fn try_admit(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| EngineError::Overloaded(self.capacity))
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Outcome of a finished run as returned to synchronous callers
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: i64,
    pub error: Option<String>,
    /// node id -> output, nodes without output omitted
    pub outputs: ConfigMap,
}

impl From<&Execution> for RunReport {
    fn from(execution: &Execution) -> Self {
        Self {
            execution_id: execution.id.clone(),
            status: execution.status,
            start_time: execution.start_time,
            end_time: execution.end_time,
            duration_ms: execution.duration_ms,
            error: execution.error.clone(),
            outputs: execution.outputs(),
        }
    }
}

/// Sync deadline for workflows that declare no API timeout
const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(300);

pub struct Invoker {
    engine: Arc<WorkflowEngine>,
    gate: RunGate,
    webhook: WebhookNotifier,
    default_timeout: Duration,
}

impl Invoker {
    pub fn new(engine: Arc<WorkflowEngine>, gate: RunGate, webhook: WebhookNotifier) -> Self {
        Self {
            engine,
            gate,
            webhook,
            default_timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn engine(&self) -> &Arc<WorkflowEngine> {
        &self.engine
    }

    pub fn gate(&self) -> &RunGate {
        &self.gate
    }

    /// Run an API invocation and wait for it
    ///
    /// `timeout` defaults to the workflow's API timeout, then to the invoker's
    /// default when the workflow declares none. When the deadline passes the
    /// execution is cancelled through the ledger, so it stops at the next node
    /// boundary, and `DeadlineExceeded` is returned.
    pub async fn run_sync(
        &self,
        workflow_id: &str,
        input: RunInput,
        timeout: Option<Duration>,
    ) -> Result<RunReport> {
        let (workflow, execution, input, permit) =
            self.admit(workflow_id, TriggerType::Api, input).await?;
        let timeout = timeout
            .or_else(|| {
                (workflow.api.timeout_secs > 0).then(|| Duration::from_secs(workflow.api.timeout_secs))
            })
            .unwrap_or(self.default_timeout);

        let engine = Arc::clone(&self.engine);
        let execution_id = execution.id.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            engine.run(&execution_id, input).await
        });

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(result)) => self.report(&execution.id, result).await,
            Ok(Err(join_error)) => Err(self.abort(&execution.id, join_error.to_string()).await),
            Err(_) => self.settle_deadline(&execution.id, timeout).await,
        }
    }

    /// Start an API invocation in the background; a webhook follows if configured
    pub async fn run_async(&self, workflow_id: &str, input: RunInput) -> Result<Execution> {
        self.spawn_run(workflow_id, TriggerType::Api, input).await
    }

    /// Start a run in the background and return the pending execution
    pub async fn spawn_run(
        &self,
        workflow_id: &str,
        trigger: TriggerType,
        input: RunInput,
    ) -> Result<Execution> {
        let (workflow, execution, input, permit) = self.admit(workflow_id, trigger, input).await?;

        let engine = Arc::clone(&self.engine);
        let webhook = self.webhook.clone();
        let webhook_url = match trigger {
            TriggerType::Api => workflow.api.webhook_url.clone().filter(|url| !url.is_empty()),
            _ => None,
        };
        let execution_id = execution.id.clone();

        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = engine.run(&execution_id, input).await {
                tracing::warn!("⚠️ Background execution {} ended with: {}", execution_id, e);
            }

            if let Some(url) = webhook_url {
                match engine.ledger().get_execution(&execution_id).await {
                    Ok(finished) => {
                        webhook.notify(&url, &finished).await;
                    }
                    Err(e) => tracing::error!(
                        "❌ Could not load execution {} for webhook: {}",
                        execution_id,
                        e
                    ),
                }
            }
        });

        Ok(execution)
    }

    pub async fn cancel(&self, execution_id: &str) -> Result<Execution> {
        self.engine.ledger().cancel_execution(execution_id).await
    }

    async fn admit(
        &self,
        workflow_id: &str,
        trigger: TriggerType,
        mut input: RunInput,
    ) -> Result<(WorkflowDefinition, Execution, RunInput, OwnedSemaphorePermit)> {
        let permit = self.gate.try_admit()?;

        let workflow = self
            .engine
            .workflows()
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;

        if trigger == TriggerType::Api {
            input.params = apply_api_params(&workflow.api.params, &input.params)?;
        }

        let execution = self
            .engine
            .ledger()
            .create_execution(&workflow, trigger)
            .await?;
        Ok((workflow, execution, input, permit))
    }

    /// Cancel a run that outlived its deadline
    ///
    /// A run that reached a terminal status while the deadline fired keeps it and is
    /// reported as finished.
    async fn settle_deadline(&self, execution_id: &str, timeout: Duration) -> Result<RunReport> {
        tracing::warn!(
            "⏰ Execution {} exceeded its {:?} deadline, cancelling",
            execution_id,
            timeout
        );
        let ledger = self.engine.ledger();
        if let Err(e) = ledger.cancel_execution(execution_id).await {
            let current = ledger.get_execution(execution_id).await?;
            if current.status.is_terminal() {
                tracing::info!(
                    "🏁 Execution {} finished as {} at its deadline",
                    execution_id,
                    current.status
                );
                return Ok(RunReport::from(&current));
            }
            tracing::warn!("⚠️ Could not cancel execution {}: {}", execution_id, e);
        }
        Err(EngineError::DeadlineExceeded(timeout.as_secs()))
    }

    /// Fail a run whose task died before finishing and drop its ledger entry
    async fn abort(&self, execution_id: &str, reason: String) -> EngineError {
        let error = EngineError::TaskAborted(reason);
        tracing::error!("💥 Execution {} aborted: {}", execution_id, error);

        let ledger = self.engine.ledger();
        if let Err(e) = ledger
            .update_execution_status(execution_id, ExecutionStatus::Failed, Some(error.to_string()))
            .await
        {
            tracing::warn!("⚠️ Could not mark execution {} failed: {}", execution_id, e);
        }
        ledger.release(execution_id).await;
        error
    }

    /// Turn a finished engine result into a report
    ///
    /// Failed and cancelled runs still produce a report once their record is final.
    async fn report(&self, execution_id: &str, result: Result<Execution>) -> Result<RunReport> {
        match result {
            Ok(execution) => Ok(RunReport::from(&execution)),
            Err(e) => {
                let execution = self.engine.ledger().get_execution(execution_id).await?;
                if execution.status.is_terminal() {
                    Ok(RunReport::from(&execution))
                } else {
                    Err(e)
                }
            }
        }
    }
}
