/// autoforge server entry point
///
/// Loads configuration from the environment and serves the workflow API.

use autoforge::{config::Config, server::start_server};

/// Application entry point
///
/// Listens on AUTOFORGE_HOST:AUTOFORGE_PORT (default 0.0.0.0:3004) and stores
/// workflows and executions in SQLite under AUTOFORGE_DATA_DIR.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
