/// Execution records
///
/// One `Execution` per run, holding per-node logs and aggregate counters. The
/// counter bookkeeping and status state machine live here as plain methods so the
/// ledger can apply them under its per-execution lock.

use crate::error::EngineError;
use crate::tools::ConfigMap;
use crate::workflow::types::{NodeKind, WorkflowDefinition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Run lifecycle: pending -> running -> {success | failed | cancelled}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Success | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    /// Forward-only transitions; a pending run may also be cancelled or failed directly
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        match (self, next) {
            (Pending, Running) => true,
            (Pending | Running, Success | Failed | Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-node status; only success, failed and skipped are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

/// What started the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    Scheduled,
    Api,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerType::Manual => "manual",
            TriggerType::Scheduled => "scheduled",
            TriggerType::Api => "api",
        };
        f.write_str(name)
    }
}

/// One run of a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub workflow_id: String,
    pub trigger_type: TriggerType,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: i64,
    pub total_nodes: u32,
    #[serde(default)]
    pub success_nodes: u32,
    #[serde(default)]
    pub failed_nodes: u32,
    #[serde(default)]
    pub skipped_nodes: u32,
    /// In execution order; one entry per node id
    #[serde(default)]
    pub node_logs: Vec<NodeExecutionLog>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Execution {
    /// New pending execution for a workflow
    pub fn new(workflow: &WorkflowDefinition, trigger_type: TriggerType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow.id.clone(),
            trigger_type,
            status: ExecutionStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: 0,
            total_nodes: workflow.nodes.len() as u32,
            success_nodes: 0,
            failed_nodes: 0,
            skipped_nodes: 0,
            node_logs: Vec::new(),
            error: None,
        }
    }

    /// Insert or replace the log for `log.node_id`, keeping counters consistent
    ///
    /// The replaced entry's status is uncounted before the new one is counted, so a
    /// node moving running -> success adds exactly one success.
    pub fn upsert_node_log(&mut self, log: NodeExecutionLog) {
        let new_status = log.status;
        match self.node_logs.iter().position(|l| l.node_id == log.node_id) {
            Some(index) => {
                let old_status = self.node_logs[index].status;
                self.node_logs[index] = log;
                if let Some(counter) = self.counter_mut(old_status) {
                    *counter = counter.saturating_sub(1);
                }
            }
            None => self.node_logs.push(log),
        }

        if let Some(counter) = self.counter_mut(new_status) {
            *counter += 1;
        }
    }

    /// Move to `next`, stamping end time and duration on terminal statuses
    pub fn transition(
        &mut self,
        next: ExecutionStatus,
        error: Option<String>,
    ) -> Result<(), EngineError> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        self.status = next;
        if next == ExecutionStatus::Running {
            self.start_time = Utc::now();
        }
        if error.as_deref().is_some_and(|e| !e.is_empty()) {
            self.error = error;
        }
        if next.is_terminal() {
            let now = Utc::now();
            self.end_time = Some(now);
            self.duration_ms = (now - self.start_time).num_milliseconds().max(0);
        }
        Ok(())
    }

    /// Output of every logged node that produced one, keyed by node id
    pub fn outputs(&self) -> ConfigMap {
        self.node_logs
            .iter()
            .filter(|log| !log.output.is_empty())
            .map(|log| (log.node_id.clone(), serde_json::Value::Object(log.output.clone())))
            .collect()
    }

    pub fn node_log(&self, node_id: &str) -> Option<&NodeExecutionLog> {
        self.node_logs.iter().find(|log| log.node_id == node_id)
    }

    fn counter_mut(&mut self, status: NodeStatus) -> Option<&mut u32> {
        match status {
            NodeStatus::Success => Some(&mut self.success_nodes),
            NodeStatus::Failed => Some(&mut self.failed_nodes),
            NodeStatus::Skipped => Some(&mut self.skipped_nodes),
            NodeStatus::Pending | NodeStatus::Running => None,
        }
    }
}

/// Record of one node within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionLog {
    pub node_id: String,
    pub node_type: NodeKind,
    pub node_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_code: Option<String>,
    pub status: NodeStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default)]
    pub input: ConfigMap,
    #[serde(default)]
    pub output: ConfigMap,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
}

impl NodeExecutionLog {
    /// A `running` entry stamped now
    pub fn started(node: &crate::workflow::WorkflowNode, input: ConfigMap) -> Self {
        Self {
            node_id: node.id.clone(),
            node_type: node.kind,
            node_name: node.display_name(),
            tool_code: node.resolved_tool_code(),
            status: NodeStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: 0,
            input,
            output: ConfigMap::new(),
            error: None,
            retry_count: 0,
        }
    }

    /// Close the entry with a final status
    pub fn finish(mut self, status: NodeStatus, output: ConfigMap, error: Option<String>) -> Self {
        let now = Utc::now();
        self.status = status;
        self.end_time = Some(now);
        self.duration_ms = (now - self.start_time).num_milliseconds().max(0);
        self.output = output;
        self.error = error;
        self
    }

    /// A zero-duration `skipped` entry carrying the skip reason
    pub fn skipped(node: &crate::workflow::WorkflowNode, reason: &str) -> Self {
        let mut output = ConfigMap::new();
        output.insert("reason".to_string(), serde_json::json!(reason));

        let mut log = Self::started(node, ConfigMap::new());
        log.status = NodeStatus::Skipped;
        log.end_time = Some(log.start_time);
        log.output = output;
        log
    }
}
