/// autoforge: workflow automation engine
///
/// Runs directed graphs of tool, condition, delay and trigger nodes with a
/// petgraph-ordered engine, a persistent execution ledger, a cron scheduler and a
/// pluggable tool runtime.

// Core configuration and setup
pub mod config;

// Error taxonomy shared by every layer
pub mod error;

// Tool plugin contract, schema validation and registry
pub mod tools;

// Workflow definitions and save-time validation
pub mod workflow;

// Execution records and the ledger that mutates them
pub mod execution;

// Repository traits with SQLite and in-memory adapters
pub mod storage;

// Runtime execution engine, invocation layer and scheduler
pub mod runtime;

// HTTP API layer
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use error::{DefinitionError, EngineError};
pub use execution::{Execution, ExecutionLedger, ExecutionStatus, TriggerType};
pub use runtime::{Invoker, RunInput, RunReport, Scheduler, WorkflowEngine};
pub use server::start_server;
pub use tools::{Tool, ToolRegistry};
pub use workflow::{WorkflowDefinition, WorkflowEdge, WorkflowNode};
