// src/pipeline/run.rs

//! Assembly of the engine from configuration.

use std::sync::Arc;

use crate::error::Result;
use crate::models::Config;
use crate::pipeline::checkpoint::CheckpointStore;
use crate::pipeline::orchestrator::RunOrchestrator;
use crate::pipeline::scheduler::{Scheduler, SchedulerConfig};
use crate::pipeline::target::TargetSyncer;
use crate::services::{HttpAssetFetcher, render, targets};
use crate::storage;
use crate::utils::http;

/// Wire the renderer, fetcher, blob store and target provider into a
/// ready-to-run orchestrator.
pub async fn build_orchestrator(config: &Config) -> Result<RunOrchestrator> {
    let client = http::create_async_client(&config.http)?;
    let renderer = render::from_config(config, client.clone())?;
    let store = storage::from_config(&config.storage).await?;

    let syncer = TargetSyncer::new(
        renderer,
        Arc::new(HttpAssetFetcher::new(client.clone())),
        Arc::clone(&store),
        config,
    );
    let scheduler = Scheduler::new(Arc::new(syncer), SchedulerConfig::from(&config.sync));
    let checkpoints = CheckpointStore::new(store, config.storage.checkpoint_object_key());
    let provider = targets::from_config(&config.targets, client);

    log::debug!(
        "Engine ready: renderer={:?}, concurrency={}, max_attempts={}, max_items_per_run={}, checkpoint={}",
        config.render.engine,
        config.sync.concurrency,
        config.sync.max_attempts,
        config.sync.max_items_per_run,
        checkpoints.key()
    );

    Ok(RunOrchestrator::new(
        provider,
        checkpoints,
        scheduler,
        &config.sync,
    ))
}
