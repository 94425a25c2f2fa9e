/// In-memory store
///
/// Workflow definitions live in an ArcSwap'd map so readers never block: each write
/// clones the current map and swaps the pointer (rcu), exactly like a hot reload.
/// Executions sit behind an async RwLock.

use crate::execution::{Execution, ExecutionStatus};
use crate::storage::{ExecutionStore, WorkflowRepository};
use crate::workflow::WorkflowDefinition;
use anyhow::Result;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct MemoryStore {
    /// workflow_id -> definition
    workflows: ArcSwap<HashMap<String, WorkflowDefinition>>,
    /// execution_id -> execution
    executions: RwLock<HashMap<String, Execution>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            workflows: ArcSwap::new(Arc::new(HashMap::new())),
            executions: RwLock::new(HashMap::new()),
        }
    }

    /// Remove a definition; returns whether it existed
    pub fn remove_workflow(&self, workflow_id: &str) -> bool {
        let existed = self.workflows.load().contains_key(workflow_id);
        if existed {
            self.workflows.rcu(|current| {
                let mut next = (**current).clone();
                next.remove(workflow_id);
                next
            });
        }
        existed
    }

    pub fn workflow_count(&self) -> usize {
        self.workflows.load().len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowRepository for MemoryStore {
    async fn get_workflow(&self, id: &str) -> Result<Option<WorkflowDefinition>> {
        Ok(self.workflows.load().get(id).cloned())
    }

    async fn list_scheduled_workflows(&self) -> Result<Vec<WorkflowDefinition>> {
        let mut scheduled: Vec<WorkflowDefinition> = self
            .workflows
            .load()
            .values()
            .filter(|workflow| workflow.is_scheduled())
            .cloned()
            .collect();
        scheduled.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(scheduled)
    }

    async fn save_workflow(&self, workflow: &WorkflowDefinition) -> Result<()> {
        self.workflows.rcu(|current| {
            let mut next = (**current).clone();
            let mut updated = workflow.clone();
            if let Some(existing) = current.get(&workflow.id) {
                updated.stats = existing.stats.clone();
            }
            next.insert(workflow.id.clone(), updated);
            next
        });
        Ok(())
    }

    async fn record_run(
        &self,
        workflow_id: &str,
        status: ExecutionStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if !self.workflows.load().contains_key(workflow_id) {
            return Err(anyhow::anyhow!("Workflow not found: {}", workflow_id));
        }

        self.workflows.rcu(|current| {
            let mut next = (**current).clone();
            if let Some(workflow) = next.get_mut(workflow_id) {
                workflow.stats.record(status, at);
            }
            next
        });
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn insert_execution(&self, execution: &Execution) -> Result<()> {
        let mut executions = self.executions.write().await;
        if executions.contains_key(&execution.id) {
            return Err(anyhow::anyhow!("Execution already exists: {}", execution.id));
        }
        executions.insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn get_execution(&self, id: &str) -> Result<Option<Execution>> {
        Ok(self.executions.read().await.get(id).cloned())
    }

    async fn save_execution(&self, execution: &Execution) -> Result<()> {
        let mut executions = self.executions.write().await;
        match executions.get_mut(&execution.id) {
            Some(existing) => {
                *existing = execution.clone();
                Ok(())
            }
            None => Err(anyhow::anyhow!("Execution not found: {}", execution.id)),
        }
    }

    async fn list_executions(&self, workflow_id: &str) -> Result<Vec<Execution>> {
        let mut listed: Vec<Execution> = self
            .executions
            .read()
            .await
            .values()
            .filter(|execution| execution.workflow_id == workflow_id)
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(listed)
    }
}
