/// Runtime Execution Engine
///
/// Orders each workflow with petgraph, walks its nodes on tokio, and exposes the
/// invocation layer and cron scheduler that start runs.

// Topological ordering of workflow graphs
pub mod dag;

// {{placeholder}} resolution against env, node outputs and external params
pub mod variables;

// Simple condition evaluation
pub mod condition;

// Individual node execution handlers
pub mod executor;

// Sequential run orchestration over the ledger
pub mod engine;

// Admission, sync/async invocation and cancellation
pub mod invocation;

// Completion webhooks for async API runs
pub mod webhook;

// Background cron scheduler
pub mod scheduler;

// Re-export main types
pub use condition::compare;
pub use dag::topological_order;
pub use engine::{RunInput, WorkflowEngine, CONDITION_SKIP_REASON};
pub use executor::{NodeExecutor, NodeOutcome, NodeRunScope};
pub use invocation::{Invoker, RunGate, RunReport};
pub use scheduler::{ReloadReport, Schedule, Scheduler};
pub use variables::{NodeOutputs, VariableScope};
pub use webhook::WebhookNotifier;
