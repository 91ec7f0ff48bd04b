// src/models/mod.rs

//! Domain models for the sync engine.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod asset;
mod checkpoint;
mod config;
mod run;
mod target;

// Re-export all public types
pub use asset::{DiscoveredAsset, ObservedRequest, ResourceType, StoredObject};
pub use checkpoint::Checkpoint;
pub use config::{
    AcceptanceConfig, Config, HttpConfig, LoggingConfig, RenderConfig, RenderEngine,
    SanityConfig,
    StorageBackend, StorageConfig, SyncConfig, TargetSource, TargetsConfig,
};
pub use run::{AttemptOutcome, AttemptRecord, FailedTarget, RunState, RunSummary, TargetReport};
pub use target::Target;
