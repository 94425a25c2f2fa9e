/// Tool plugin contract
///
/// Every capability a `tool` node can call implements `Tool`. The engine only ever
/// talks to tools through this trait, so concrete tools can live in other crates.

use crate::tools::types::{
    ConfigMap, ConfigSchema, ExecutionContext, ExecutionResult, OutputFieldDef, ToolError,
    ToolMetadata, ValidationError,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// A pluggable capability invoked by tool nodes
#[async_trait]
pub trait Tool: Send + Sync {
    /// Static description (code, category, tags, output schema)
    fn metadata(&self) -> &ToolMetadata;

    /// Configuration schema used by `validate`
    fn schema(&self) -> &ConfigSchema;

    /// Check a resolved configuration before execution
    fn validate(&self, config: &ConfigMap) -> Result<(), ValidationError> {
        self.schema().validate(config)
    }

    /// Run the tool
    ///
    /// Return `Ok` with `success = false` for business failures and `Err` for
    /// transport-level failures; the engine treats both as a failed node.
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        config: &ConfigMap,
    ) -> Result<ExecutionResult, ToolError>;

    /// Optional capability: output shape that depends on configuration
    fn output_describer(&self) -> Option<&dyn DynamicOutputDescriber> {
        None
    }
}

/// Tools whose output fields depend on how they are configured
pub trait DynamicOutputDescriber: Send + Sync {
    fn describe_output(&self, config: &ConfigMap) -> HashMap<String, OutputFieldDef>;
}
