// src/models/checkpoint.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resumable position in the target list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Index of the next target to attempt
    pub cursor: usize,
    #[serde(alias = "updated_at", default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(cursor: usize) -> Self {
        Self {
            cursor,
            updated_at: Utc::now(),
        }
    }

    /// Starting point of a deployment that has never run.
    pub fn initial() -> Self {
        Self::new(0)
    }
}
