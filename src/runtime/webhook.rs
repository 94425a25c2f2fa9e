/// Completion webhook for asynchronous API runs
///
/// Delivery is best effort: one POST, no retries, failures only logged. The
/// execution record is never touched.

use crate::execution::Execution;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("⚠️ Falling back to default webhook client: {}", e);
                reqwest::Client::new()
            });
        Self { client }
    }

    /// Body sent to the webhook; timestamps are unix seconds
    pub fn payload(execution: &Execution) -> Value {
        json!({
            "execution_id": execution.id,
            "workflow_id": execution.workflow_id,
            "status": execution.status,
            "start_time": execution.start_time.timestamp(),
            "end_time": execution.end_time.map(|t| t.timestamp()).unwrap_or(0),
            "duration_ms": execution.duration_ms,
            "error": execution.error.clone().unwrap_or_default(),
            "outputs": execution.outputs(),
        })
    }

    /// POST the payload; returns whether the receiver answered 2xx
    pub async fn notify(&self, url: &str, execution: &Execution) -> bool {
        tracing::info!("📤 Sending webhook for execution {} to {}", execution.id, url);

        match self
            .client
            .post(url)
            .json(&Self::payload(execution))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                tracing::info!("✅ Webhook delivered for execution {}", execution.id);
                true
            }
            Ok(response) => {
                tracing::warn!(
                    "⚠️ Webhook for execution {} answered {}",
                    execution.id,
                    response.status()
                );
                false
            }
            Err(e) => {
                tracing::error!("❌ Webhook delivery failed for execution {}: {}", execution.id, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{ExecutionStatus, NodeExecutionLog, NodeStatus, TriggerType};
    use crate::tools::ConfigMap;
    use crate::workflow::{WorkflowDefinition, WorkflowNode};

    #[test]
    fn test_payload_shape() {
        let workflow: WorkflowDefinition = serde_json::from_value(json!({
            "id": "wf", "name": "wf",
            "nodes": [{"id": "a", "type": "trigger"}, {"id": "b", "type": "trigger"}]
        }))
        .unwrap();
        let mut execution = Execution::new(&workflow, TriggerType::Api);
        execution.transition(ExecutionStatus::Running, None).unwrap();

        let node: WorkflowNode = serde_json::from_value(json!({"id": "a", "type": "trigger"})).unwrap();
        let mut output = ConfigMap::new();
        output.insert("triggered".into(), json!(true));
        execution.upsert_node_log(
            NodeExecutionLog::started(&node, ConfigMap::new()).finish(NodeStatus::Success, output, None),
        );
        execution.transition(ExecutionStatus::Success, None).unwrap();

        let payload = WebhookNotifier::payload(&execution);
        assert_eq!(payload["execution_id"], execution.id.as_str());
        assert_eq!(payload["status"], "success");
        assert_eq!(payload["error"], "");
        assert_eq!(payload["outputs"]["a"]["triggered"], true);
        assert!(payload["outputs"].get("b").is_none());
        assert!(payload["end_time"].as_i64().unwrap() >= payload["start_time"].as_i64().unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_receiver_is_not_fatal() {
        let workflow: WorkflowDefinition = serde_json::from_value(json!({
            "id": "wf", "name": "wf", "nodes": [{"id": "a", "type": "trigger"}]
        }))
        .unwrap();
        let execution = Execution::new(&workflow, TriggerType::Api);

        let notifier = WebhookNotifier::new(Duration::from_secs(1));
        assert!(!notifier.notify("http://127.0.0.1:1/hook", &execution).await);
    }
}
