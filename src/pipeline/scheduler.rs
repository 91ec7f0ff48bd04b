// src/pipeline/scheduler.rs

//! Bounded-concurrency dispatch of per-target work.
//!
//! Pass 1 runs every target with `concurrency` in-flight tasks and the full
//! attempt budget. Targets that still fail get a second pass at reduced
//! concurrency with a smaller budget; whatever fails there is reported and
//! left for the next sweep. Dispatch is FIFO in input order; completion order
//! is arbitrary, results are returned in input order.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{FailedTarget, SyncConfig, Target, TargetReport};
use crate::pipeline::retry::{RetryOutcome, RetryPolicy, run_with_retry};

/// Processes a single target end to end. One call is one attempt.
#[async_trait]
pub trait TargetProcessor: Send + Sync {
    async fn process(&self, target: &Target) -> Result<TargetReport>;
}

/// Concurrency and attempt budgets for both passes.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub concurrency: usize,
    pub first_pass: RetryPolicy,
    pub retry_pass_concurrency: usize,
    /// `None` disables the second pass
    pub retry_pass: Option<RetryPolicy>,
}

impl From<&SyncConfig> for SchedulerConfig {
    fn from(config: &SyncConfig) -> Self {
        let concurrency = config.concurrency.max(1);
        Self {
            concurrency,
            first_pass: RetryPolicy::new(config.max_attempts, config.retry_pause()),
            retry_pass_concurrency: config.retry_pass_concurrency.clamp(1, concurrency),
            retry_pass: (config.retry_pass_attempts > 0)
                .then(|| RetryPolicy::new(config.retry_pass_attempts, config.retry_pause())),
        }
    }
}

/// Result of processing a slice of targets.
#[derive(Debug, Default)]
pub struct ScheduleOutcome {
    pub succeeded: Vec<TargetReport>,
    pub failed: Vec<FailedTarget>,
}

impl ScheduleOutcome {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

pub struct Scheduler {
    processor: Arc<dyn TargetProcessor>,
    config: SchedulerConfig,
}

type PassResult = (Vec<(usize, TargetReport)>, Vec<(usize, PendingFailure)>);

impl Scheduler {
    pub fn new(processor: Arc<dyn TargetProcessor>, config: SchedulerConfig) -> Self {
        Self { processor, config }
    }

    /// Process every target, with one retry pass for failures.
    pub async fn process_all(&self, targets: &[Target]) -> ScheduleOutcome {
        let jobs: Vec<(usize, &Target, u32)> =
            targets.iter().enumerate().map(|(i, t)| (i, t, 0)).collect();
        let (mut succeeded, mut failed) = self
            .run_pass(jobs, self.config.concurrency, &self.config.first_pass)
            .await;

        if let Some(retry_policy) = &self.config.retry_pass {
            let (retryable, terminal): (Vec<_>, Vec<_>) = failed
                .into_iter()
                .partition(|(_, f)| f.retryable);
            failed = terminal;

            if !retryable.is_empty() {
                log::info!(
                    "Retrying {} failed target(s) with concurrency {}",
                    retryable.len(),
                    self.config.retry_pass_concurrency
                );
                let jobs: Vec<(usize, &Target, u32)> = retryable
                    .iter()
                    .map(|(i, f)| (*i, &targets[*i], f.attempts))
                    .collect();
                let (rescued, still_failed) = self
                    .run_pass(jobs, self.config.retry_pass_concurrency, retry_policy)
                    .await;
                succeeded.extend(rescued);
                failed.extend(still_failed);
            }
        }

        succeeded.sort_by_key(|(i, _)| *i);
        failed.sort_by_key(|(i, _)| *i);

        for (_, f) in &failed {
            log::error!(
                "Giving up on {} after {} attempt(s): {}",
                f.target,
                f.attempts,
                f.error
            );
        }

        ScheduleOutcome {
            succeeded: succeeded.into_iter().map(|(_, r)| r).collect(),
            failed: failed.into_iter().map(|(_, f)| f.into()).collect(),
        }
    }

    async fn run_pass(
        &self,
        jobs: Vec<(usize, &Target, u32)>,
        limit: usize,
        policy: &RetryPolicy,
    ) -> PassResult {
        let processor = &self.processor;
        let mut results = stream::iter(jobs)
            .map(|(index, target, prior_attempts)| async move {
                let outcome =
                    run_with_retry(policy, &target.locator, |_| processor.process(target)).await;
                (index, target, prior_attempts, outcome)
            })
            .buffer_unordered(limit.max(1));

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        while let Some((index, target, prior_attempts, outcome)) = results.next().await {
            match outcome {
                RetryOutcome::Success {
                    mut value,
                    attempts,
                } => {
                    value.attempts = prior_attempts + attempts;
                    succeeded.push((index, value));
                }
                RetryOutcome::Failure { error, attempts } => {
                    failed.push((
                        index,
                        PendingFailure {
                            target: target.clone(),
                            error_kind: error.kind().to_string(),
                            error: error.to_string(),
                            retryable: error.is_retryable(),
                            attempts: prior_attempts + attempts,
                        },
                    ));
                }
            }
        }
        (succeeded, failed)
    }
}

/// Failure carried between passes; keeps the retryable flag.
struct PendingFailure {
    target: Target,
    error_kind: String,
    error: String,
    retryable: bool,
    attempts: u32,
}

impl From<PendingFailure> for FailedTarget {
    fn from(p: PendingFailure) -> Self {
        FailedTarget {
            target: p.target,
            error_kind: p.error_kind,
            error: p.error,
            attempts: p.attempts,
        }
    }
}
