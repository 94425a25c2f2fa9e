/// Server setup and initialization
///
/// Wires together storage, ledger, tool registry, engine, invoker and scheduler,
/// then serves the HTTP routes until ctrl-c.

use crate::{
    api::{create_router, AppState},
    config::Config,
    execution::ExecutionLedger,
    runtime::{Invoker, RunGate, Scheduler, WebhookNotifier, WorkflowEngine},
    storage::{ExecutionStore, SqliteStore, WorkflowRepository},
    tools::{HttpRequestTool, ToolRegistry},
};
use anyhow::Result;
use axum::Router;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// A wired application ready to serve
pub struct App {
    pub router: Router,
    pub state: AppState,
    /// Stops background listeners on shutdown
    pub shutdown: CancellationToken,
}

/// Build every service over the given store
///
/// The scheduler is constructed but not started.
pub async fn build_state<S>(config: &Config, store: Arc<S>) -> Result<AppState>
where
    S: WorkflowRepository + ExecutionStore + 'static,
{
    tracing::info!("🧰 Initializing tool registry");
    let tools = Arc::new(ToolRegistry::new());
    tools
        .register(Arc::new(HttpRequestTool::new()))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to register built-in tools: {}", e))?;

    tracing::info!("🚀 Initializing workflow engine");
    let ledger = Arc::new(ExecutionLedger::new(store.clone()));
    let engine = Arc::new(WorkflowEngine::new(store, ledger, Arc::clone(&tools)));

    let invoker = Arc::new(
        Invoker::new(
            engine,
            RunGate::new(config.runtime.max_concurrent_runs),
            WebhookNotifier::new(config.runtime.webhook_timeout()),
        )
        .with_default_timeout(Duration::from_secs(config.runtime.default_sync_timeout_secs)),
    );

    tracing::info!("⏰ Initializing cron scheduler");
    let scheduler = Arc::new(
        Scheduler::new(Arc::clone(&invoker))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize scheduler: {}", e))?,
    );

    Ok(AppState {
        invoker,
        scheduler,
        tools,
    })
}

/// Create the application: open storage, wire services, start the scheduler
pub async fn create_app(config: Config) -> Result<App> {
    let path = config.database.database_path();
    tracing::info!("📁 Opening database: {}", path);
    let store = Arc::new(SqliteStore::open(&path).await?);

    let state = build_state(&config, store).await?;

    state
        .scheduler
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start scheduler: {}", e))?;

    let shutdown = CancellationToken::new();
    state.scheduler.spawn_change_listener(shutdown.clone());

    tracing::info!("📡 Creating HTTP router with all endpoints");
    let router = create_router(state.clone());

    tracing::info!("✅ Application initialized successfully");
    Ok(App {
        router,
        state,
        shutdown,
    })
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting autoforge server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.router.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    tracing::info!("⏹️ Shutting down");
    app.shutdown.cancel();
    if let Err(e) = app.state.scheduler.stop().await {
        tracing::warn!("⚠️ Scheduler did not stop cleanly: {}", e);
    }

    Ok(())
}
