/// Built-in HTTP request tool
///
/// Reference implementation of the tool contract: performs one HTTP call with
/// reqwest and exposes status, headers and the (JSON-decoded when possible) body.

use crate::tools::contract::Tool;
use crate::tools::types::{
    ConfigMap, ConfigSchema, ExecutionContext, ExecutionResult, OutputFieldDef, PropertySchema,
    ToolError, ToolMetadata,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::{collections::HashMap, time::Duration};

pub const HTTP_REQUEST_TOOL: &str = "http_request";

const DEFAULT_TIMEOUT_SECS: f64 = 30.0;

/// Sends a single HTTP request described by the node configuration
///
/// Expected config: { "url": "https://api.example.com/data", "method": "POST",
/// "headers": {...}, "body": {...}, "timeout": 10 }
pub struct HttpRequestTool {
    metadata: ToolMetadata,
    schema: ConfigSchema,
    client: reqwest::Client,
}

impl HttpRequestTool {
    pub fn new() -> Self {
        let mut output_fields = HashMap::new();
        output_fields.insert("status".to_string(), OutputFieldDef::new("number", "Status code"));
        output_fields.insert("headers".to_string(), OutputFieldDef::new("object", "Response headers"));
        output_fields.insert("data".to_string(), OutputFieldDef::new("object", "Response body"));
        output_fields.insert("success".to_string(), OutputFieldDef::new("boolean", "2xx response"));

        let metadata = ToolMetadata {
            code: HTTP_REQUEST_TOOL.to_string(),
            name: "HTTP Request".to_string(),
            description: "Call an external HTTP API".to_string(),
            category: "network".to_string(),
            version: "1.0.0".to_string(),
            author: "autoforge".to_string(),
            ai_callable: true,
            tags: vec!["http".to_string(), "api".to_string(), "webhook".to_string()],
            output_fields_schema: output_fields,
        };

        let schema = ConfigSchema::default()
            .required_property(
                "url",
                PropertySchema::string("URL")
                    .with_description("Absolute request URL")
                    .with_length(Some(1), None),
            )
            .property(
                "method",
                PropertySchema::string("Method")
                    .with_default(json!("GET"))
                    .with_enum(vec![
                        json!("GET"),
                        json!("POST"),
                        json!("PUT"),
                        json!("DELETE"),
                        json!("PATCH"),
                    ]),
            )
            .property("headers", PropertySchema::object("Headers"))
            .property(
                "timeout",
                PropertySchema::number("Timeout (seconds)")
                    .with_default(json!(DEFAULT_TIMEOUT_SECS))
                    .with_range(Some(1.0), Some(300.0)),
            );

        Self {
            metadata,
            schema,
            client: reqwest::Client::new(),
        }
    }

    fn build_request(&self, config: &ConfigMap) -> Result<reqwest::RequestBuilder, ToolError> {
        let url = config
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::new("INVALID_CONFIG", "missing 'url' parameter"))?;
        let method = config.get("method").and_then(Value::as_str).unwrap_or("GET");

        let mut request = match method.to_uppercase().as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "DELETE" => self.client.delete(url),
            "PATCH" => self.client.patch(url),
            other => {
                return Err(ToolError::new(
                    "INVALID_CONFIG",
                    format!("unsupported HTTP method: {}", other),
                ))
            }
        };

        if let Some(headers) = config.get("headers").and_then(Value::as_object) {
            for (key, value) in headers {
                if let Some(header_value) = value.as_str() {
                    request = request.header(key.as_str(), header_value);
                }
            }
        }

        match config.get("body") {
            Some(body @ (Value::Object(_) | Value::Array(_))) => {
                request = request.json(body);
            }
            Some(Value::String(text)) => {
                request = request
                    .header("Content-Type", "text/plain")
                    .body(text.clone());
            }
            _ => {}
        }

        let timeout = config
            .get("timeout")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Ok(request.timeout(Duration::from_secs_f64(timeout)))
    }
}

impl Default for HttpRequestTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
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
        let started = std::time::Instant::now();
        let request = self.build_request(config)?;

        tracing::debug!("🌍 HTTP request: {:?}", config.get("url"));

        let response = tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => {
                return Err(ToolError::new("CANCELLED", "execution cancelled during HTTP request"));
            }
            response = request.send() => response
                .map_err(|e| ToolError::new("HTTP_ERROR", format!("HTTP request failed: {}", e)))?,
        };

        let status = response.status();
        let headers: ConfigMap = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), json!(s))))
            .collect();

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::new("HTTP_ERROR", format!("failed to read response body: {}", e)))?;
        let data = serde_json::from_str::<Value>(&body).unwrap_or_else(|_| json!(body));

        let mut output = ConfigMap::new();
        output.insert("status".to_string(), json!(status.as_u16()));
        output.insert("headers".to_string(), Value::Object(headers));
        output.insert("data".to_string(), data);
        output.insert("success".to_string(), json!(status.is_success()));

        let duration_ms = started.elapsed().as_millis() as i64;
        let mut result = if status.is_success() {
            ExecutionResult::succeeded(format!("HTTP {}", status.as_u16()), output)
        } else {
            let mut failed = ExecutionResult::failed(
                format!("HTTP {}", status.as_u16()),
                format!("server responded with status {}", status),
            );
            failed.output = output;
            failed
        };
        result.status_code = Some(status.as_u16());
        result.response_body = Some(body);

        tracing::info!("✅ HTTP request completed with status {} in {}ms", status, duration_ms);
        Ok(result.with_duration(duration_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_requires_url() {
        let tool = HttpRequestTool::new();
        let err = tool.validate(&ConfigMap::new()).unwrap_err();
        assert_eq!(err.field, "url");
    }

    #[test]
    fn test_schema_rejects_unknown_method() {
        let tool = HttpRequestTool::new();
        let config = json!({"url": "http://localhost", "method": "TRACE"});
        let err = tool.validate(config.as_object().unwrap()).unwrap_err();
        assert_eq!(err.field, "method");
    }

    #[tokio::test]
    async fn test_cancelled_context_aborts_request() {
        let tool = HttpRequestTool::new();
        let ctx = ExecutionContext::default();
        ctx.cancellation.cancel();

        let config = json!({"url": "http://10.255.255.1:9/", "timeout": 30});
        let err = tool
            .execute(&ctx, config.as_object().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.code, "CANCELLED");
    }
}
