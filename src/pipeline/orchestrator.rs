// src/pipeline/orchestrator.rs

//! One run: load targets, resume the cursor, process the run slice in
//! batches, persist the cursor after every batch.
//!
//! ```text
//! Idle -> LoadingTargets -> Resuming -> ProcessingBatch -> PersistingCheckpoint
//!      -> (ProcessingBatch | SweepComplete | Idle)
//! ```
//!
//! Any provider or checkpoint failure ends the run in `Faulted`; batches
//! already persisted stay persisted. A crash inside a batch re-processes the
//! whole batch on the next run.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Checkpoint, RunState, RunSummary, SyncConfig, Target};
use crate::pipeline::checkpoint::{CheckpointStore, advance, run_window};
use crate::pipeline::scheduler::Scheduler;
use crate::services::TargetProvider;

pub struct RunOrchestrator {
    provider: Arc<dyn TargetProvider>,
    checkpoints: CheckpointStore,
    scheduler: Scheduler,
    max_items_per_run: usize,
    batch_size: usize,
}

impl RunOrchestrator {
    pub fn new(
        provider: Arc<dyn TargetProvider>,
        checkpoints: CheckpointStore,
        scheduler: Scheduler,
        sync: &SyncConfig,
    ) -> Self {
        Self {
            provider,
            checkpoints,
            scheduler,
            max_items_per_run: sync.max_items_per_run.max(1),
            batch_size: sync.batch_size,
        }
    }

    /// Override the per-run item cap.
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items_per_run = max_items.max(1);
        self
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Current checkpoint.
    pub async fn status(&self) -> Result<Checkpoint> {
        self.checkpoints.load().await
    }

    /// Overwrite the checkpoint, e.g. to restart a sweep.
    pub async fn reset(&self, cursor: usize) -> Result<Checkpoint> {
        log::info!("Resetting checkpoint cursor to {}", cursor);
        self.checkpoints.save(cursor).await
    }

    /// Resolve the target list without processing anything.
    pub async fn targets(&self) -> Result<Vec<Target>> {
        self.provider
            .load_targets()
            .await
            .map_err(as_provider_failure)
    }

    /// Execute one run invocation.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut state = RunState::Idle;

        transition(&mut state, RunState::LoadingTargets);
        let targets = self.targets().await.inspect_err(|e| fault(&mut state, e))?;

        transition(&mut state, RunState::Resuming);
        let checkpoint = self
            .checkpoints
            .load()
            .await
            .inspect_err(|e| fault(&mut state, e))?;

        let len = targets.len();
        let window = run_window(checkpoint.cursor, len, self.max_items_per_run);
        if window.start != checkpoint.cursor {
            log::warn!(
                "Cursor {} is past the end of {} targets, starting a new sweep",
                checkpoint.cursor,
                len
            );
        }
        log::info!(
            "Run covers targets [{}, {}) of {}",
            window.start,
            window.end,
            len
        );

        let mut summary = RunSummary::new(len, window.start);
        let batch_size = match self.batch_size {
            0 => self.max_items_per_run,
            n => n.min(self.max_items_per_run),
        };

        if window.is_empty() {
            log::warn!("Target list is empty");
            transition(&mut state, RunState::PersistingCheckpoint);
            self.checkpoints
                .save(0)
                .await
                .inspect_err(|e| fault(&mut state, e))?;
            summary.sweep_complete = true;
        }

        let mut cursor = window.start;
        for batch in targets[window].chunks(batch_size) {
            transition(&mut state, RunState::ProcessingBatch);
            let outcome = self.scheduler.process_all(batch).await;

            summary.batches += 1;
            summary.attempted += outcome.attempted();
            for report in outcome.succeeded {
                summary.record(report);
            }
            summary.failed.extend(outcome.failed);

            transition(&mut state, RunState::PersistingCheckpoint);
            let (next, wrapped) = advance(cursor, batch.len(), len);
            self.checkpoints
                .save(next)
                .await
                .inspect_err(|e| fault(&mut state, e))?;
            cursor = next;
            summary.next_cursor = next;
            summary.sweep_complete = wrapped;
        }

        transition(
            &mut state,
            if summary.sweep_complete {
                RunState::SweepComplete
            } else {
                RunState::Idle
            },
        );
        summary.finished_at = Utc::now();

        log::info!(
            "Run finished: {} attempted, {} succeeded, {} failed, next cursor {}{}",
            summary.attempted,
            summary.succeeded,
            summary.failed.len(),
            summary.next_cursor,
            if summary.sweep_complete {
                " (sweep complete)"
            } else {
                ""
            }
        );
        Ok(summary)
    }

    /// Repeat runs until the cursor wraps, at most `max_runs` times.
    pub async fn sweep(&self, max_runs: usize) -> Result<Vec<RunSummary>> {
        let mut summaries = Vec::new();
        for _ in 0..max_runs.max(1) {
            let summary = self.run().await?;
            let done = summary.sweep_complete;
            summaries.push(summary);
            if done {
                break;
            }
        }
        Ok(summaries)
    }
}

fn transition(state: &mut RunState, next: RunState) {
    log::debug!("Run state {} -> {}", state, next);
    *state = next;
}

fn fault(state: &mut RunState, error: &AppError) {
    transition(state, RunState::Faulted);
    log::error!("Run faulted: {}", error);
}

fn as_provider_failure(error: AppError) -> AppError {
    match error {
        AppError::Provider(_) => error,
        other => AppError::provider(other),
    }
}
