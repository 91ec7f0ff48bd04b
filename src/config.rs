// src/config.rs

//! Configuration loading utilities.
//!
//! A TOML file provides the base configuration; environment variables then
//! override individual fields. Secrets are only ever read from the
//! environment.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::models::{Config, StorageBackend, TargetSource};

/// Load configuration from `path` (defaults when missing) and apply the
/// process environment. Callers report a missing file once their logger is
/// up.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        Config::default()
    };
    apply_process_env(&mut config)?;
    Ok(config)
}

/// Apply overrides from the process environment.
pub fn apply_process_env(config: &mut Config) -> Result<()> {
    apply_env(config, |name| std::env::var(name).ok())
}

/// Apply overrides using `lookup` to read variables.
///
/// Empty values are ignored. Setting a bucket switches the storage backend to
/// s3; setting a Sanity project switches the target source to sanity.
pub fn apply_env<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(v) = var("MAX_ITEMS_PER_RUN") {
        config.sync.max_items_per_run = parse("MAX_ITEMS_PER_RUN", &v)?;
    }
    if let Some(v) = var("MAX_CONCURRENT") {
        config.sync.concurrency = parse("MAX_CONCURRENT", &v)?;
    }
    if let Some(v) = var("MAX_ATTEMPTS") {
        config.sync.max_attempts = parse("MAX_ATTEMPTS", &v)?;
    }
    if let Some(v) = var("RENDER_TIMEOUT_SECS") {
        config.render.timeout_secs = parse("RENDER_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = var("RENDER_ENGINE") {
        config.render.engine = v.parse()?;
    }
    if let Some(path) = var("CHROMIUM_PATH") {
        config.render.chromium_path = Some(PathBuf::from(path));
    }

    if let Some(bucket) = var("S3_BUCKET").or_else(|| var("CF_R2_BUCKET")) {
        config.storage.bucket = bucket;
        config.storage.backend = StorageBackend::S3;
    }
    if let Some(prefix) = var("S3_PREFIX") {
        config.storage.prefix = prefix;
    }
    if let Some(endpoint) = var("CF_R2_ENDPOINT") {
        config.storage.endpoint_url = Some(endpoint);
    }
    if let Some(public_url) = var("CF_R2_PUBLIC_URL") {
        config.storage.public_url = Some(public_url);
    }

    if let Some(project_id) = var("SANITY_PROJECT_ID") {
        config.targets.sanity.project_id = project_id;
        config.targets.source = TargetSource::Sanity;
    }
    if let Some(dataset) = var("SANITY_DATASET") {
        config.targets.sanity.dataset = dataset;
    }
    if let Some(token) = var("SANITY_API_TOKEN") {
        config.targets.sanity.token = Some(token);
    }
    if let Some(file) = var("TARGETS_FILE") {
        config.targets.file = PathBuf::from(file);
    }

    Ok(())
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| AppError::config(format!("{} has an invalid value: {:?}", name, value)))
}
