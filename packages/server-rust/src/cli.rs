//! Command-line surface of the `trackflow` binary.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use trackflow_core::PipelineRequest;

use crate::linear::{LinearConfig, DEFAULT_API_URL};
use crate::service::ServerConfig;

#[derive(Debug, Parser)]
#[command(
    name = "trackflow",
    version,
    about = "Call issue-tracker operations and run multi-step pipelines"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Linear API key
    #[arg(long, env = "LINEAR_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// GraphQL endpoint
    #[arg(long, env = "TRACKFLOW_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "TRACKFLOW_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Serve Prometheus metrics on this address while the command runs
    #[arg(long, env = "TRACKFLOW_METRICS_ADDR", global = true)]
    pub metrics_addr: Option<SocketAddr>,

    /// Per-call deadline in milliseconds
    #[arg(long, env = "TRACKFLOW_OPERATION_TIMEOUT_MS", default_value_t = 30_000, global = true)]
    pub operation_timeout_ms: u64,

    /// Concurrent operations allowed before calls are rejected
    #[arg(
        long,
        env = "TRACKFLOW_MAX_CONCURRENT",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u32).range(1..),
        global = true
    )]
    pub max_concurrent: u32,

    /// Interval between metrics reports in milliseconds
    #[arg(long, env = "TRACKFLOW_REPORT_INTERVAL_MS", default_value_t = 60_000, global = true)]
    pub report_interval_ms: u64,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List every callable tool
    Tools,
    /// Call one tool
    Call {
        /// Tool name (e.g. `list_issues`)
        name: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Run a pipeline described in a JSON file
    Pipeline {
        /// Path to a pipeline request (`{"steps": [...], "context": {...}}`)
        file: PathBuf,
    },
}

impl Cli {
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            default_operation_timeout_ms: self.operation_timeout_ms,
            max_concurrent_operations: self.max_concurrent,
            metrics_report_interval_ms: self.report_interval_ms,
        }
    }

    /// The HTTP deadline sits just above the per-call deadline so the
    /// middleware reports the timeout.
    #[must_use]
    pub fn linear_config(&self) -> LinearConfig {
        LinearConfig {
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone().filter(|k| !k.trim().is_empty()),
            request_timeout: Duration::from_millis(self.operation_timeout_ms.saturating_add(1_000)),
        }
    }
}

/// Parses `--args` into a JSON value.
///
/// # Errors
///
/// Returns an error when `raw` is not valid JSON.
pub fn parse_arguments(raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).context("--args must be valid JSON")
}

/// Reads a pipeline request from a JSON file.
///
/// # Errors
///
/// Returns an error when the file cannot be read or is not a pipeline request.
pub async fn load_pipeline(path: &Path) -> anyhow::Result<PipelineRequest> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a pipeline request", path.display()))
}
