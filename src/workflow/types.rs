/// Core workflow type definitions
///
/// Workflows are authored as JSON (nodes, edges, env vars, schedule, API settings)
/// and persisted as JSON. Field names follow the editor's wire format, so node tool
/// codes are `toolCode` while everything else is snake_case.

use crate::execution::ExecutionStatus;
use crate::tools::ConfigMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A complete workflow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique workflow identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Creator of the workflow
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub description: String,
    /// Nodes in authoring order (ties in the execution order follow this order)
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
    /// Definition-level environment, overridable per run
    #[serde(default)]
    pub env_vars: Vec<EnvVar>,
    /// One of "", manual, daily, weekly, monthly, hourly, interval, cron
    #[serde(default)]
    pub schedule_type: String,
    /// Format depends on `schedule_type`, e.g. "09:30:00" for daily
    #[serde(default)]
    pub schedule_value: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Settings for API invocation
    #[serde(default)]
    pub api: ApiSettings,
    /// Aggregate run counters, maintained by the engine
    #[serde(default)]
    pub stats: WorkflowStats,
}

fn default_enabled() -> bool {
    true
}

impl WorkflowDefinition {
    /// Whether the scheduler should register a job for this workflow
    pub fn is_scheduled(&self) -> bool {
        let schedule_type = self.schedule_type.trim();
        self.enabled && !schedule_type.is_empty() && schedule_type != "manual"
    }

    pub fn node(&self, node_id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|node| node.id == node_id)
    }
}

/// A single node of the workflow graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Unique within the definition, e.g. "n1"
    pub id: String,
    /// Determines which handler runs the node
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Registry code of the tool (tool nodes only)
    #[serde(rename = "toolCode", default, skip_serializing_if = "Option::is_none")]
    pub tool_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Node-specific configuration; string leaves may contain `{{...}}` placeholders
    #[serde(default)]
    pub config: ConfigMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    /// Editor canvas position, not used by the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Legacy editor payload; older definitions keep tool_code/config/label here
    #[serde(default, skip_serializing_if = "ConfigMap::is_empty")]
    pub data: ConfigMap,
}

impl WorkflowNode {
    /// Display name used in execution logs
    ///
    /// Falls back through `name`, `data.label`, `data.name`, the tool code and
    /// finally the node type.
    pub fn display_name(&self) -> String {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        self.name
            .as_deref()
            .and_then(non_empty)
            .or_else(|| self.data.get("label").and_then(Value::as_str).and_then(non_empty))
            .or_else(|| self.data.get("name").and_then(Value::as_str).and_then(non_empty))
            .or_else(|| match self.kind {
                NodeKind::Tool => self.resolved_tool_code(),
                _ => None,
            })
            .unwrap_or_else(|| self.kind.to_string())
    }

    /// Tool code from the node, falling back to the legacy `data.tool_code`
    pub fn resolved_tool_code(&self) -> Option<String> {
        self.tool_code
            .as_deref()
            .filter(|code| !code.is_empty())
            .or_else(|| self.data.get("tool_code").and_then(Value::as_str))
            .filter(|code| !code.is_empty())
            .map(str::to_string)
    }

    /// Configuration, falling back to the legacy `data.config` when empty
    pub fn resolved_config(&self) -> Option<ConfigMap> {
        if !self.config.is_empty() {
            return Some(self.config.clone());
        }
        match self.data.get("config") {
            Some(Value::Object(config)) => Some(config.clone()),
            _ => None,
        }
    }
}

/// Node types understood by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Calls a registered tool
    Tool,
    /// Marks the run start; no-op
    Trigger,
    /// API entry point; its `config.params` declare the caller parameters
    ExternalTrigger,
    /// Evaluates a comparison and gates the rest of the run
    Condition,
    /// Sleeps for a configured duration
    Delay,
    /// Branch routing placeholder (not implemented)
    Switch,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Tool => "tool",
            NodeKind::Trigger => "trigger",
            NodeKind::ExternalTrigger => "external_trigger",
            NodeKind::Condition => "condition",
            NodeKind::Delay => "delay",
            NodeKind::Switch => "switch",
        };
        f.write_str(name)
    }
}

/// Directed dependency between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Upstream node id
    #[serde(alias = "from")]
    pub source: String,
    /// Downstream node id
    #[serde(alias = "to")]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl WorkflowEdge {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            id: None,
            source: source.to_string(),
            target: target.to_string(),
            label: None,
        }
    }
}

/// Retry descriptor; recorded with the definition but not acted on by the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub max_retries: u32,
    /// Seconds between attempts
    #[serde(default)]
    pub retry_interval: u64,
    #[serde(default)]
    pub exponential_backoff: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Definition-level environment variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub description: String,
    /// Value is stored encrypted at rest; the engine receives it decrypted
    #[serde(default)]
    pub encrypted: bool,
}

/// How the workflow behaves when invoked through the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Deadline for synchronous runs
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
    /// Receives a completion notification after asynchronous runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Declared parameters accepted from callers
    #[serde(default)]
    pub params: Vec<ApiParam>,
}

fn default_api_timeout() -> u64 {
    300
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_api_timeout(),
            webhook_url: None,
            params: Vec::new(),
        }
    }
}

/// A caller-supplied parameter exposed as `{{external.KEY}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiParam {
    pub key: String,
    /// string, number, boolean, object or array
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub description: String,
}

/// Aggregate run counters for a workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub total_executions: u64,
    pub success_executions: u64,
    pub failed_executions: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_executed_at: Option<DateTime<Utc>>,
}

impl WorkflowStats {
    /// Account one finished run; cancelled runs only count toward the total
    pub fn record(&mut self, status: ExecutionStatus, at: DateTime<Utc>) {
        self.total_executions += 1;
        match status {
            ExecutionStatus::Success => self.success_executions += 1,
            ExecutionStatus::Failed => self.failed_executions += 1,
            _ => {}
        }
        self.last_executed_at = Some(at);
    }
}
