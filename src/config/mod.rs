/// Configuration management for the autoforge engine
///
/// Handles server binding, storage location and runtime limits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Run admission and timeouts
    pub runtime: RuntimeConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding the SQLite file (default: "data")
    pub data_dir: String,
    /// Explicit database file; overrides `{data_dir}/autoforge.db`
    pub url: Option<String>,
}

impl DatabaseConfig {
    pub fn database_path(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| format!("{}/autoforge.db", self.data_dir))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Runs allowed in flight at once; further runs are rejected
    pub max_concurrent_runs: usize,
    /// Sync timeout when neither caller nor workflow gives one
    pub default_sync_timeout_secs: u64,
    pub webhook_timeout_secs: u64,
}

impl RuntimeConfig {
    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(fallback)
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("AUTOFORGE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("AUTOFORGE_PORT", 3004),
            },
            database: DatabaseConfig {
                data_dir: std::env::var("AUTOFORGE_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
                url: std::env::var("AUTOFORGE_DATABASE_URL").ok(),
            },
            runtime: RuntimeConfig {
                max_concurrent_runs: env_or("AUTOFORGE_MAX_CONCURRENT_RUNS", 64),
                default_sync_timeout_secs: env_or("AUTOFORGE_SYNC_TIMEOUT_SECS", 300),
                webhook_timeout_secs: env_or("AUTOFORGE_WEBHOOK_TIMEOUT_SECS", 10),
            },
        }
    }
}
