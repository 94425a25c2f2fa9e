/// Workflow Definitions
///
/// Type definitions for workflows, nodes, edges, env vars and API settings, plus the
/// save-time structural validation every definition must pass.

// Core workflow type definitions
pub mod types;

// Definition and API parameter validation
pub mod validation;

// Re-export commonly used types
pub use types::{
    ApiParam, ApiSettings, EnvVar, NodeKind, RetryPolicy, WorkflowDefinition, WorkflowEdge,
    WorkflowNode, WorkflowStats,
};
pub use validation::{apply_api_params, extract_external_trigger_params, validate_definition};
