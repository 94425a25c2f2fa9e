/// Node execution handlers
///
/// Dispatches a single node to its type handler:
/// - tool: registry lookup, schema validation, `Tool::execute`
/// - trigger: entry marker, always succeeds
/// - condition: simple field comparison (expression mode is not implemented)
/// - delay: sleeps on the tokio timer
/// - switch: not implemented, always takes the default branch
///
/// Every node gets a `running` log entry in the ledger before its handler starts.
/// The finished entry is returned to the engine, which records it.

use crate::error::EngineError;
use crate::execution::{ExecutionLedger, NodeExecutionLog, NodeStatus};
use crate::runtime::condition;
use crate::runtime::variables::{NodeOutputs, VariableScope};
use crate::tools::{ConfigMap, ExecutionContext, ToolRegistry};
use crate::workflow::{NodeKind, WorkflowNode};
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// Run-wide state a node handler can read
#[derive(Debug, Clone)]
pub struct NodeRunScope<'a> {
    pub execution_id: &'a str,
    pub env: &'a HashMap<String, String>,
    pub outputs: &'a NodeOutputs,
    pub external: &'a ConfigMap,
    pub cancellation: CancellationToken,
}

impl<'a> NodeRunScope<'a> {
    pub fn variables(&self) -> VariableScope<'a> {
        VariableScope::new(self.env, self.outputs, self.external)
    }
}

/// Result of one node: the finished log entry plus either its output or its error
#[derive(Debug)]
pub struct NodeOutcome {
    pub log: NodeExecutionLog,
    pub output: ConfigMap,
    pub error: Option<EngineError>,
}

impl NodeOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// A handler error, optionally carrying the partial output to keep on the log
struct Failure {
    error: EngineError,
    output: ConfigMap,
}

impl From<EngineError> for Failure {
    fn from(error: EngineError) -> Self {
        Self {
            error,
            output: ConfigMap::new(),
        }
    }
}

type HandlerResult = Result<ConfigMap, Failure>;

pub struct NodeExecutor {
    registry: Arc<ToolRegistry>,
    ledger: Arc<ExecutionLedger>,
}

impl NodeExecutor {
    pub fn new(registry: Arc<ToolRegistry>, ledger: Arc<ExecutionLedger>) -> Self {
        Self { registry, ledger }
    }

    /// Execute one node and return its finished log entry
    pub async fn execute(&self, node: &WorkflowNode, scope: &NodeRunScope<'_>) -> NodeOutcome {
        tracing::info!("🚀 Starting node execution: {} (type: {})", node.id, node.kind);
        let start_time = std::time::Instant::now();

        let running = NodeExecutionLog::started(node, self.log_input(node, scope));
        if let Err(e) = self
            .ledger
            .add_node_log(scope.execution_id, running.clone())
            .await
        {
            tracing::error!("❌ Failed to record start of node {}: {}", node.id, e);
        }

        let result = match node.kind {
            NodeKind::Tool => self.execute_tool_node(node, scope).await,
            NodeKind::Trigger | NodeKind::ExternalTrigger => Ok(single("triggered", json!(true))),
            NodeKind::Condition => self.execute_condition_node(node, scope),
            NodeKind::Delay => self.execute_delay_node(node, scope).await,
            NodeKind::Switch => Ok(self.execute_switch_node(node)),
        };

        let duration = start_time.elapsed();
        match result {
            Ok(output) => {
                tracing::info!("✅ Node execution completed: {} in {:?}", node.id, duration);
                NodeOutcome {
                    log: running.finish(NodeStatus::Success, output.clone(), None),
                    output,
                    error: None,
                }
            }
            Err(Failure { error, output }) => {
                tracing::error!(
                    "❌ Node execution failed: {} in {:?} - Error: {}",
                    node.id,
                    duration,
                    error
                );
                NodeOutcome {
                    log: running.finish(NodeStatus::Failed, output.clone(), Some(error.to_string())),
                    output,
                    error: Some(error),
                }
            }
        }
    }

    /// Input recorded on the log: raw config, resolved tool config, caller params
    fn log_input(&self, node: &WorkflowNode, scope: &NodeRunScope<'_>) -> ConfigMap {
        let mut input = ConfigMap::new();
        if !node.config.is_empty() {
            input.insert("config".into(), Value::Object(node.config.clone()));
        }
        if node.kind == NodeKind::Tool {
            if let Some(config) = node.resolved_config() {
                let resolved = scope.variables().resolve_config(&config);
                if !resolved.is_empty() {
                    input.insert("resolved_config".into(), Value::Object(resolved));
                }
            }
        }
        if !scope.external.is_empty() {
            input.insert(
                "external_params".into(),
                Value::Object(scope.external.clone()),
            );
        }
        input
    }

    async fn execute_tool_node(&self, node: &WorkflowNode, scope: &NodeRunScope<'_>) -> HandlerResult {
        let code = node
            .resolved_tool_code()
            .ok_or_else(|| misconfigured(node, "tool code is not configured"))?;
        let config = node
            .resolved_config()
            .ok_or_else(|| misconfigured(node, "tool configuration is missing"))?;
        let config = scope.variables().resolve_config(&config);

        let tool = self
            .registry
            .get(&code)
            .await
            .map_err(|_| EngineError::ToolNotFound(code.clone()))?;

        tool.validate(&config)
            .map_err(|source| EngineError::ToolValidation {
                code: code.clone(),
                source,
            })?;

        let ctx = self.tool_context(node, scope);
        tracing::debug!("🔧 Invoking tool '{}' for node {}", code, node.id);

        let result = tool
            .execute(&ctx, &config)
            .await
            .map_err(|e| EngineError::ToolExecution(e.to_string()))?;

        if !result.success {
            return Err(Failure {
                error: EngineError::ToolExecution(result.message),
                output: result.output,
            });
        }
        Ok(result.output)
    }

    /// Context handed to tools: outputs so far, env, caller params and the current node
    fn tool_context(&self, node: &WorkflowNode, scope: &NodeRunScope<'_>) -> ExecutionContext {
        let current = json!({
            "nodeId": node.id,
            "nodeType": node.kind.to_string(),
            "nodeName": node.display_name(),
        });
        let env: ConfigMap = scope
            .env
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();

        let mut ctx = ExecutionContext::new(scope.cancellation.clone());
        ctx.task_id = scope.execution_id.to_string();
        ctx.variables
            .insert("nodes".into(), Value::Object(scope.outputs.to_map()));
        ctx.variables.insert("env".into(), Value::Object(env));
        ctx.variables
            .insert("external".into(), Value::Object(scope.external.clone()));
        ctx.variables.insert("current".into(), current.clone());
        ctx.metadata.insert("current".into(), current);
        ctx
    }

    fn execute_condition_node(&self, node: &WorkflowNode, scope: &NodeRunScope<'_>) -> HandlerResult {
        if node.config.is_empty() {
            return Err(misconfigured(node, "condition configuration is missing").into());
        }

        match node.config.get("conditionType").and_then(Value::as_str) {
            Some("simple") => condition::evaluate_simple(&node.config, scope.outputs)
                .map_err(|message| misconfigured(node, message).into()),
            Some("expression") => {
                tracing::warn!(
                    "⚠️ Expression conditions are not implemented, node {} passes",
                    node.id
                );
                let mut output = single("result", json!(true));
                output.insert("implemented".into(), json!(false));
                output.insert(
                    "message".into(),
                    json!("expression conditions are not implemented, passing"),
                );
                Ok(output)
            }
            _ => {
                let mut output = single("result", json!(true));
                output.insert("message".into(), json!("no condition type specified, passing"));
                Ok(output)
            }
        }
    }

    async fn execute_delay_node(&self, node: &WorkflowNode, scope: &NodeRunScope<'_>) -> HandlerResult {
        let config = scope.variables().resolve_config(&node.config);

        let duration = match config.get("duration") {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(1.0),
            Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(1.0),
            _ => 1.0,
        };
        let unit = config
            .get("unit")
            .and_then(Value::as_str)
            .unwrap_or("seconds")
            .to_string();

        let delayed_seconds = match unit.as_str() {
            "minutes" => duration * 60.0,
            "hours" => duration * 3600.0,
            _ => duration,
        };
        let wait = Duration::try_from_secs_f64(delayed_seconds.max(0.0)).map_err(|_| {
            misconfigured(node, format!("invalid delay of {} seconds", delayed_seconds))
        })?;

        tracing::debug!("⏳ Node {} sleeping for {:?}", node.id, wait);
        tokio::time::sleep(wait).await;

        let mut output = single("delayed_seconds", json!(delayed_seconds));
        output.insert("duration".into(), json!(duration));
        output.insert("unit".into(), json!(unit));
        Ok(output)
    }

    fn execute_switch_node(&self, node: &WorkflowNode) -> ConfigMap {
        tracing::warn!(
            "⚠️ Switch routing is not implemented, node {} takes the default branch",
            node.id
        );
        let mut output = single("branch", json!("default"));
        output.insert("implemented".into(), json!(false));
        output.insert(
            "message".into(),
            json!("switch routing is not implemented, taking the default branch"),
        );
        output
    }
}

fn single(key: &str, value: Value) -> ConfigMap {
    let mut map = ConfigMap::new();
    map.insert(key.to_string(), value);
    map
}

fn misconfigured(node: &WorkflowNode, message: impl Into<String>) -> EngineError {
    EngineError::NodeConfig {
        node_id: node.id.clone(),
        message: message.into(),
    }
}
