/// Error taxonomy for the workflow engine
///
/// Definition problems are caught when a workflow is saved; everything else is raised
/// while a run is scheduled, admitted or executed. Storage adapters speak `anyhow`
/// and are folded in through the transparent `Storage` variant.

use std::fmt;
use thiserror::Error;

/// Which end of an edge referenced a node that does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSide {
    Source,
    Target,
}

impl fmt::Display for EdgeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeSide::Source => write!(f, "source"),
            EdgeSide::Target => write!(f, "target"),
        }
    }
}

/// Structural problems in a workflow definition
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("workflow must contain at least one node")]
    Empty,

    #[error("node id must not be empty")]
    EmptyNodeId,

    #[error("duplicate node id: '{0}'")]
    DuplicateNodeId(String),

    #[error("edge {side} references unknown node '{node_id}'")]
    UnknownNodeReference { node_id: String, side: EdgeSide },
}

/// Errors produced by the engine, ledger, scheduler and invocation layer
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("workflow graph contains a cycle: {ordered} of {total} nodes could be ordered")]
    CycleDetected { ordered: usize, total: usize },

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool '{code}' rejected its configuration: {source}")]
    ToolValidation {
        code: String,
        #[source]
        source: crate::tools::ValidationError,
    },

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("node '{node_id}' is misconfigured: {message}")]
    NodeConfig { node_id: String, message: String },

    #[error("invalid {schedule_type} schedule '{value}': {reason}")]
    ScheduleParse {
        schedule_type: String,
        value: String,
        reason: String,
    },

    #[error("execution {0} was cancelled")]
    Cancelled(String),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("workflow {0} is disabled")]
    WorkflowDisabled(String),

    #[error("execution {id} cannot move from {from} to {to}")]
    InvalidTransition { id: String, from: String, to: String },

    #[error("execution did not finish within {0} seconds")]
    DeadlineExceeded(u64),

    #[error("run rejected: {0} runs already in flight")]
    Overloaded(usize),

    #[error("invalid parameter '{key}': {message}")]
    InvalidParam { key: String, message: String },

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("run task aborted: {0}")]
    TaskAborted(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    /// Stable machine-readable code, used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Definition(_) => "DEFINITION_ERROR",
            EngineError::CycleDetected { .. } => "CYCLE_DETECTED",
            EngineError::ToolNotFound(_) => "TOOL_NOT_FOUND",
            EngineError::ToolValidation { .. } => "TOOL_VALIDATION",
            EngineError::ToolExecution(_) => "TOOL_EXECUTION",
            EngineError::NodeConfig { .. } => "NODE_CONFIG",
            EngineError::ScheduleParse { .. } => "SCHEDULE_PARSE",
            EngineError::Cancelled(_) => "CANCELLED",
            EngineError::WorkflowNotFound(_) => "WORKFLOW_NOT_FOUND",
            EngineError::ExecutionNotFound(_) => "EXECUTION_NOT_FOUND",
            EngineError::WorkflowDisabled(_) => "WORKFLOW_DISABLED",
            EngineError::InvalidTransition { .. } => "INVALID_TRANSITION",
            EngineError::DeadlineExceeded(_) => "DEADLINE_EXCEEDED",
            EngineError::Overloaded(_) => "OVERLOADED",
            EngineError::InvalidParam { .. } => "INVALID_PARAM",
            EngineError::Scheduler(_) => "SCHEDULER_ERROR",
            EngineError::TaskAborted(_) => "TASK_ABORTED",
            EngineError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub(crate) fn schedule(schedule_type: &str, value: &str, reason: impl Into<String>) -> Self {
        EngineError::ScheduleParse {
            schedule_type: schedule_type.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
