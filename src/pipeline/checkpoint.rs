// src/pipeline/checkpoint.rs

//! Resumable cursor over the target list.
//!
//! The checkpoint is a single small JSON object in the blob store. A missing
//! object means "never ran" and yields cursor 0. Writes are plain puts, so two
//! overlapping runs race and the last write wins.

use std::ops::Range;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::Checkpoint;
use crate::storage::BlobStore;

/// Loads and saves the [`Checkpoint`] through a blob store.
pub struct CheckpointStore {
    store: Arc<dyn BlobStore>,
    key: String,
}

impl CheckpointStore {
    pub fn new(store: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the checkpoint, defaulting to cursor 0 on first run.
    ///
    /// Accepts the JSON form as well as a bare decimal counter.
    pub async fn load(&self) -> Result<Checkpoint> {
        let bytes = self
            .store
            .get(&self.key)
            .await
            .map_err(|e| AppError::provider(format!("checkpoint unreadable: {}", e)))?;

        let Some(bytes) = bytes else {
            log::info!("No checkpoint at {}, starting from 0", self.location());
            return Ok(Checkpoint::initial());
        };

        parse_checkpoint(&bytes).ok_or_else(|| {
            AppError::provider(format!(
                "checkpoint at {} is not valid: {:?}",
                self.location(),
                String::from_utf8_lossy(&bytes)
            ))
        })
    }

    /// Persist a new cursor.
    pub async fn save(&self, cursor: usize) -> Result<Checkpoint> {
        let checkpoint = Checkpoint::new(cursor);
        let body = serde_json::to_vec_pretty(&checkpoint)?;
        self.store
            .put(&self.key, body, "application/json")
            .await
            .map_err(|e| AppError::provider(format!("checkpoint unwritable: {}", e)))?;
        log::debug!("Saved checkpoint cursor={} to {}", cursor, self.location());
        Ok(checkpoint)
    }

    fn location(&self) -> String {
        self.store.location(&self.key)
    }
}

fn parse_checkpoint(bytes: &[u8]) -> Option<Checkpoint> {
    if let Ok(checkpoint) = serde_json::from_slice::<Checkpoint>(bytes) {
        return Some(checkpoint);
    }
    let text = std::str::from_utf8(bytes).ok()?.trim();
    if text.is_empty() {
        return Some(Checkpoint::initial());
    }
    text.parse::<usize>().ok().map(Checkpoint::new)
}

/// Index range a run starting at `cursor` should attempt.
///
/// A cursor at or past the end of the list (e.g. after the list shrank)
/// starts a new sweep at 0.
pub fn run_window(cursor: usize, len: usize, max_items: usize) -> Range<usize> {
    let start = if cursor >= len { 0 } else { cursor };
    let end = start.saturating_add(max_items).min(len);
    start..end
}

/// Cursor after `attempted` more targets; wraps to 0 once the list is consumed.
///
/// Returns the new cursor and whether the sweep completed.
pub fn advance(cursor: usize, attempted: usize, len: usize) -> (usize, bool) {
    let next = cursor.saturating_add(attempted);
    if next >= len { (0, true) } else { (next, false) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> CheckpointStore {
        CheckpointStore::new(
            Arc::new(LocalStorage::new(tmp.path())),
            "aldi/_state/checkpoint.json",
        )
    }

    #[tokio::test]
    async fn test_missing_checkpoint_is_zero() {
        let tmp = TempDir::new().unwrap();
        let checkpoint = store(&tmp).load().await.unwrap();
        assert_eq!(checkpoint.cursor, 0);
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let checkpoints = store(&tmp);

        for cursor in [0, 1, 100, 249] {
            checkpoints.save(cursor).await.unwrap();
            assert_eq!(checkpoints.load().await.unwrap().cursor, cursor);
        }
    }

    #[tokio::test]
    async fn test_plain_counter_is_accepted() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage
            .put("aldi/_state/checkpoint.json", b"42\n".to_vec(), "text/plain")
            .await
            .unwrap();

        let checkpoint = store(&tmp).load().await.unwrap();
        assert_eq!(checkpoint.cursor, 42);
    }

    #[tokio::test]
    async fn test_garbage_is_provider_failure() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage
            .put("aldi/_state/checkpoint.json", b"{oops".to_vec(), "text/plain")
            .await
            .unwrap();

        let err = store(&tmp).load().await.unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
    }

    #[test]
    fn test_run_window() {
        assert_eq!(run_window(0, 250, 100), 0..100);
        assert_eq!(run_window(200, 250, 100), 200..250);
        assert_eq!(run_window(250, 250, 100), 0..100);
        assert_eq!(run_window(300, 120, 100), 0..100);
        assert_eq!(run_window(0, 0, 100), 0..0);
    }

    #[test]
    fn test_advance_wraps() {
        assert_eq!(advance(0, 100, 250), (100, false));
        assert_eq!(advance(200, 50, 250), (0, true));
        assert_eq!(advance(0, 0, 0), (0, true));
    }
}
