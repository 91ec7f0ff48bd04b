// src/lambda/mod.rs

//! AWS Lambda handler.
//!
//! Each invocation is one run: load targets, resume from the stored cursor,
//! process the next slice and persist the cursor. Configuration comes from the
//! environment (optionally on top of a bundled TOML file at `ADSYNC_CONFIG`).

use std::path::PathBuf;

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::config::load_config;
use crate::error::Result;
use crate::models::{Config, RunSummary};
use crate::pipeline::build_orchestrator;

/// Lambda invocation payload. Every field is optional, so scheduled events
/// with arbitrary bodies still trigger a normal run.
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    /// Override `sync.max_items_per_run` for this invocation
    #[serde(default)]
    pub max_items: Option<usize>,

    /// Set the cursor to this value before running
    #[serde(default)]
    pub reset: Option<usize>,
}

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
pub struct RunResponse {
    /// Whether the run reached a terminal non-faulted state
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,

    /// Error message if the run faulted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(
    event: LambdaEvent<RunRequest>,
) -> std::result::Result<RunResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();

    info!(
        "Starting run: max_items={:?}, reset={:?}",
        request.max_items, request.reset
    );

    match run(&request).await {
        Ok(summary) => {
            info!(
                "Run completed: {} attempted, {} failed, next cursor {}",
                summary.attempted,
                summary.failed.len(),
                summary.next_cursor
            );
            Ok(RunResponse {
                success: true,
                summary: Some(summary),
                error: None,
                execution_time_ms: start.elapsed().as_millis() as u64,
            })
        }
        Err(e) => {
            error!("Run faulted: {}", e);
            Ok(RunResponse {
                success: false,
                error: Some(e.to_string()),
                execution_time_ms: start.elapsed().as_millis() as u64,
                ..Default::default()
            })
        }
    }
}

async fn run(request: &RunRequest) -> Result<RunSummary> {
    let config = lambda_config()?;
    config.validate()?;

    let mut runner = build_orchestrator(&config).await?;
    if let Some(max_items) = request.max_items {
        runner = runner.with_max_items(max_items);
    }
    if let Some(cursor) = request.reset {
        runner.reset(cursor).await?;
    }
    runner.run().await
}

fn lambda_config() -> Result<Config> {
    let path = std::env::var("ADSYNC_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/config.toml"));
    if !path.exists() {
        warn!("Config file {} not found, using defaults", path.display());
    }
    load_config(&path)
}
