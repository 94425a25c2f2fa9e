/// Execution Tracking
///
/// Per-run records with node logs and counters, and the ledger that serializes every
/// mutation of a run and carries its cancellation signal.

// Execution records and node logs
pub mod types;

// Serialized status and log updates
pub mod ledger;

pub use ledger::ExecutionLedger;
pub use types::{Execution, ExecutionStatus, NodeExecutionLog, NodeStatus, TriggerType};
