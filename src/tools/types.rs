/// Tool contract data types
///
/// Declarative metadata and configuration schema every tool publishes, plus the
/// per-call context handed to `execute` and the result it returns. These types are
/// serialized as-is by the tools listing endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Free-form JSON object used for node and tool configuration
pub type ConfigMap = Map<String, Value>;

/// Descriptive information about a tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Registry key, e.g. "http_request"
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Grouping used by the catalogue, e.g. "network", "notification"
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
    /// Whether an AI agent may invoke this tool directly
    #[serde(default)]
    pub ai_callable: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Static description of the fields found in `ExecutionResult::output`
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub output_fields_schema: HashMap<String, OutputFieldDef>,
}

/// One field of a tool's output, possibly nested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFieldDef {
    #[serde(rename = "type")]
    pub field_type: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub children: HashMap<String, OutputFieldDef>,
}

impl OutputFieldDef {
    pub fn new(field_type: &str, label: &str) -> Self {
        Self {
            field_type: field_type.to_string(),
            label: label.to_string(),
            children: HashMap::new(),
        }
    }
}

/// JSON-schema-like description of a tool's configuration object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    /// Always "object"
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: HashMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for ConfigSchema {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: Vec::new(),
        }
    }
}

impl ConfigSchema {
    /// Add a property
    pub fn property(mut self, name: &str, schema: PropertySchema) -> Self {
        self.properties.insert(name.to_string(), schema);
        self
    }

    /// Add a property and mark it required
    pub fn required_property(mut self, name: &str, schema: PropertySchema) -> Self {
        self.required.push(name.to_string());
        self.property(name, schema)
    }
}

/// Constraints for a single configuration property
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertySchema {
    /// One of string, number, boolean, array, object
    #[serde(rename = "type")]
    pub prop_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "minLength", default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(rename = "maxLength", default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, PropertySchema>,
    /// Value must be masked in logs and UIs
    #[serde(default)]
    pub secret: bool,
}

impl PropertySchema {
    fn typed(prop_type: &str, title: &str) -> Self {
        Self {
            prop_type: prop_type.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn string(title: &str) -> Self {
        Self::typed("string", title)
    }

    pub fn number(title: &str) -> Self {
        Self::typed("number", title)
    }

    pub fn boolean(title: &str) -> Self {
        Self::typed("boolean", title)
    }

    pub fn array(title: &str) -> Self {
        Self::typed("array", title)
    }

    pub fn object(title: &str) -> Self {
        Self::typed("object", title)
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = values;
        self
    }

    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn with_range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }
}

/// Per-call context handed to a tool
///
/// `variables` and `metadata` are filled by the engine with the resolution namespace
/// (`nodes`, `env`, `external`, `current`). The cancellation token fires when the
/// owning execution is cancelled; tools doing long I/O should watch it.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub cancellation: CancellationToken,
    pub task_id: String,
    pub user_id: String,
    pub variables: ConfigMap,
    pub metadata: ConfigMap,
}

impl ExecutionContext {
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            ..Default::default()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Outcome of a tool call
///
/// `success = false` is a node failure even when `execute` returned `Ok`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub output: ConfigMap,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
}

impl ExecutionResult {
    pub fn succeeded(message: impl Into<String>, output: ConfigMap) -> Self {
        Self {
            success: true,
            message: message.into(),
            output,
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: error.into(),
            ..Default::default()
        }
    }

    pub fn with_duration(mut self, duration_ms: i64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// A configuration value that failed schema validation
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Transport-level failure raised by a tool (as opposed to `success = false`)
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct ToolError {
    pub code: String,
    pub message: String,
}

impl ToolError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
