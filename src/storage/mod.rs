/// Persistence boundary
///
/// The engine, ledger and scheduler only see these two traits. `SqliteStore` keeps
/// definitions and executions in SQLite as JSON documents; `MemoryStore` keeps them
/// in process and backs the test suite.

use crate::execution::{Execution, ExecutionStatus};
use crate::workflow::WorkflowDefinition;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// In-process store with lock-free definition snapshots
pub mod memory;

// SQLite store using sqlx
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Read access to workflow definitions plus the stats write-back
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn get_workflow(&self, id: &str) -> Result<Option<WorkflowDefinition>>;

    /// Enabled workflows whose schedule type is neither empty nor "manual"
    async fn list_scheduled_workflows(&self) -> Result<Vec<WorkflowDefinition>>;

    /// Insert or replace a definition; existing stats are preserved
    async fn save_workflow(&self, workflow: &WorkflowDefinition) -> Result<()>;

    /// Account a finished run in the workflow's aggregate stats
    async fn record_run(
        &self,
        workflow_id: &str,
        status: ExecutionStatus,
        at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Execution rows
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn insert_execution(&self, execution: &Execution) -> Result<()>;

    async fn get_execution(&self, id: &str) -> Result<Option<Execution>>;

    async fn save_execution(&self, execution: &Execution) -> Result<()>;

    /// Executions of one workflow, newest first
    async fn list_executions(&self, workflow_id: &str) -> Result<Vec<Execution>>;
}
