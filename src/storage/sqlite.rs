/// SQLite persistence layer
///
/// Definitions and executions are stored as JSON documents next to a few indexed
/// columns. Workflow stats live in their own columns so a finished run can be
/// accounted with a single atomic UPDATE instead of rewriting the definition.

use crate::execution::{Execution, ExecutionStatus};
use crate::storage::{ExecutionStore, WorkflowRepository};
use crate::workflow::{WorkflowDefinition, WorkflowStats};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow},
    Row,
};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) a database file and initialize the schema
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let store = Self::new(pool);
        store.init_schema().await?;
        tracing::info!("✅ SQLite store ready at {}", path.display());
        Ok(store)
    }

    /// Create tables and indexes; safe to call repeatedly
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflows (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                scheduled INTEGER NOT NULL DEFAULT 0,
                definition JSON NOT NULL,
                total_executions INTEGER NOT NULL DEFAULT 0,
                success_executions INTEGER NOT NULL DEFAULT 0,
                failed_executions INTEGER NOT NULL DEFAULT 0,
                last_executed_at TEXT,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                status TEXT NOT NULL,
                start_time TEXT NOT NULL,
                record JSON NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_executions_workflow ON executions(workflow_id, start_time)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn workflow_from_row(row: &SqliteRow) -> Result<WorkflowDefinition> {
        let definition_json: String = row.get("definition");
        let mut workflow: WorkflowDefinition = serde_json::from_str(&definition_json)?;

        let last_executed_at: Option<String> = row.get("last_executed_at");
        workflow.stats = WorkflowStats {
            total_executions: row.get::<i64, _>("total_executions") as u64,
            success_executions: row.get::<i64, _>("success_executions") as u64,
            failed_executions: row.get::<i64, _>("failed_executions") as u64,
            last_executed_at: last_executed_at
                .map(|at| DateTime::parse_from_rfc3339(&at).map(|at| at.with_timezone(&Utc)))
                .transpose()?,
        };
        Ok(workflow)
    }

    fn execution_from_row(row: &SqliteRow) -> Result<Execution> {
        let record_json: String = row.get("record");
        Ok(serde_json::from_str(&record_json)?)
    }
}

#[async_trait]
impl WorkflowRepository for SqliteStore {
    async fn get_workflow(&self, id: &str) -> Result<Option<WorkflowDefinition>> {
        let row = sqlx::query("SELECT * FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::workflow_from_row).transpose()
    }

    async fn list_scheduled_workflows(&self) -> Result<Vec<WorkflowDefinition>> {
        let rows = sqlx::query("SELECT * FROM workflows WHERE scheduled = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::workflow_from_row).collect()
    }

    async fn save_workflow(&self, workflow: &WorkflowDefinition) -> Result<()> {
        let definition_json = serde_json::to_string(workflow)?;

        sqlx::query(
            r#"
            INSERT INTO workflows (id, name, scheduled, definition, updated_at)
            VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                scheduled = excluded.scheduled,
                definition = excluded.definition,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&workflow.id)
        .bind(&workflow.name)
        .bind(workflow.is_scheduled())
        .bind(&definition_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_run(
        &self,
        workflow_id: &str,
        status: ExecutionStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE workflows SET
                total_executions = total_executions + 1,
                success_executions = success_executions + ?,
                failed_executions = failed_executions + ?,
                last_executed_at = ?
            WHERE id = ?
            "#,
        )
        .bind((status == ExecutionStatus::Success) as i64)
        .bind((status == ExecutionStatus::Failed) as i64)
        .bind(at.to_rfc3339())
        .bind(workflow_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("Workflow not found: {}", workflow_id));
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for SqliteStore {
    async fn insert_execution(&self, execution: &Execution) -> Result<()> {
        let record_json = serde_json::to_string(execution)?;

        sqlx::query(
            "INSERT INTO executions (id, workflow_id, status, start_time, record) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&execution.id)
        .bind(&execution.workflow_id)
        .bind(execution.status.as_str())
        .bind(execution.start_time.to_rfc3339())
        .bind(&record_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_execution(&self, id: &str) -> Result<Option<Execution>> {
        let row = sqlx::query("SELECT record FROM executions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::execution_from_row).transpose()
    }

    async fn save_execution(&self, execution: &Execution) -> Result<()> {
        let record_json = serde_json::to_string(execution)?;

        let result = sqlx::query(
            "UPDATE executions SET status = ?, start_time = ?, record = ? WHERE id = ?",
        )
        .bind(execution.status.as_str())
        .bind(execution.start_time.to_rfc3339())
        .bind(&record_json)
        .bind(&execution.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("Execution not found: {}", execution.id));
        }
        Ok(())
    }

    async fn list_executions(&self, workflow_id: &str) -> Result<Vec<Execution>> {
        let rows = sqlx::query(
            "SELECT record FROM executions WHERE workflow_id = ? ORDER BY start_time DESC",
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::execution_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::TriggerType;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteStore::new(pool);
        store.init_schema().await.unwrap();
        store
    }

    fn workflow(id: &str, schedule_type: &str) -> WorkflowDefinition {
        serde_json::from_value(json!({
            "id": id, "name": id,
            "schedule_type": schedule_type, "schedule_value": "10",
            "nodes": [{"id": "a", "type": "trigger"}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_workflow_upsert_and_stats() {
        let store = memory_store().await;
        store.save_workflow(&workflow("wf", "interval")).await.unwrap();
        store
            .record_run("wf", ExecutionStatus::Failed, Utc::now())
            .await
            .unwrap();
        store
            .record_run("wf", ExecutionStatus::Cancelled, Utc::now())
            .await
            .unwrap();

        // Re-saving must not reset counters
        store.save_workflow(&workflow("wf", "interval")).await.unwrap();

        let loaded = store.get_workflow("wf").await.unwrap().unwrap();
        assert_eq!(loaded.stats.total_executions, 2);
        assert_eq!(loaded.stats.failed_executions, 1);
        assert_eq!(loaded.stats.success_executions, 0);
        assert!(loaded.stats.last_executed_at.is_some());

        assert!(store.get_workflow("ghost").await.unwrap().is_none());
        assert!(store
            .record_run("ghost", ExecutionStatus::Success, Utc::now())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_scheduled_listing() {
        let store = memory_store().await;
        store.save_workflow(&workflow("a", "interval")).await.unwrap();
        store.save_workflow(&workflow("b", "manual")).await.unwrap();
        store.save_workflow(&workflow("c", "")).await.unwrap();

        let mut disabled = workflow("d", "daily");
        disabled.enabled = false;
        store.save_workflow(&disabled).await.unwrap();

        let scheduled = store.list_scheduled_workflows().await.unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].id, "a");
    }

    #[tokio::test]
    async fn test_execution_persistence() {
        let store = memory_store().await;
        let wf = workflow("wf", "");
        let mut execution = Execution::new(&wf, TriggerType::Scheduled);
        store.insert_execution(&execution).await.unwrap();

        execution.transition(ExecutionStatus::Running, None).unwrap();
        execution.transition(ExecutionStatus::Success, None).unwrap();
        store.save_execution(&execution).await.unwrap();

        let loaded = store.get_execution(&execution.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ExecutionStatus::Success);
        assert_eq!(loaded.trigger_type, TriggerType::Scheduled);
        assert!(loaded.end_time.is_some());

        let listed = store.list_executions("wf").await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
