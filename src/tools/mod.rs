/// Tool Runtime
///
/// The plugin contract every tool implements, its declarative metadata/schema types,
/// default schema validation, the registry the engine looks tools up in, and the
/// built-in HTTP request tool.

// Metadata, schema, context and result types
pub mod types;

// Default ConfigSchema validation
pub mod schema;

// The Tool trait and the dynamic-output capability
pub mod contract;

// Code -> tool lookup table
pub mod registry;

// Built-in http_request tool
pub mod http;

pub use contract::{DynamicOutputDescriber, Tool};
pub use http::HttpRequestTool;
pub use registry::{RegistryError, ToolRegistry};
pub use types::{
    ConfigMap, ConfigSchema, ExecutionContext, ExecutionResult, OutputFieldDef, PropertySchema,
    ToolError, ToolMetadata, ValidationError,
};
