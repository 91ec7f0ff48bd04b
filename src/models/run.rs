// src/models/run.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Target;

/// Outcome of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttemptOutcome {
    Success,
    Failure,
}

/// One attempt at processing a target. Logged, never persisted.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub target: String,
    /// 1-based attempt index
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,
    pub error: Option<String>,
}

/// What happened to one successfully processed target.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TargetReport {
    pub target: String,
    pub folder: String,
    pub discovered: usize,
    pub uploaded: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub upload_failures: usize,
    pub delete_failures: usize,
    /// Public URLs (or keys) of the objects written in this run
    pub uploaded_urls: Vec<String>,
    pub attempts: u32,
}

/// A target that exhausted every attempt in this sweep.
#[derive(Debug, Clone, Serialize)]
pub struct FailedTarget {
    pub target: Target,
    pub error_kind: String,
    pub error: String,
    pub attempts: u32,
}

/// Orchestrator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    LoadingTargets,
    Resuming,
    ProcessingBatch,
    PersistingCheckpoint,
    SweepComplete,
    Faulted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::LoadingTargets => "loading-targets",
            RunState::Resuming => "resuming",
            RunState::ProcessingBatch => "processing-batch",
            RunState::PersistingCheckpoint => "persisting-checkpoint",
            RunState::SweepComplete => "sweep-complete",
            RunState::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// Summary of one run invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub target_count: usize,
    pub start_cursor: usize,
    pub next_cursor: usize,
    pub batches: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedTarget>,
    pub uploaded: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub sweep_complete: bool,
    pub reports: Vec<TargetReport>,
}

impl RunSummary {
    pub fn new(target_count: usize, start_cursor: usize) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            target_count,
            start_cursor,
            next_cursor: start_cursor,
            batches: 0,
            attempted: 0,
            succeeded: 0,
            failed: Vec::new(),
            uploaded: 0,
            deleted: 0,
            unchanged: 0,
            sweep_complete: false,
            reports: Vec::new(),
        }
    }

    /// Fold one target report into the totals.
    pub fn record(&mut self, report: TargetReport) {
        self.succeeded += 1;
        self.uploaded += report.uploaded;
        self.deleted += report.deleted;
        self.unchanged += report.unchanged;
        self.reports.push(report);
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_record_and_elapsed() {
        let mut summary = RunSummary::new(10, 4);
        summary.record(TargetReport {
            uploaded: 2,
            deleted: 1,
            unchanged: 3,
            ..TargetReport::default()
        });
        summary.finished_at = summary.started_at + Duration::milliseconds(1500);

        assert_eq!(summary.succeeded, 1);
        assert_eq!((summary.uploaded, summary.deleted, summary.unchanged), (2, 1, 3));
        assert_eq!(summary.elapsed_ms(), 1500);
    }
}
