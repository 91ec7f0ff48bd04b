// src/error.rs

//! Unified error handling for the sync engine.
//!
//! Errors fall into two scopes:
//!
//! - **Target-scoped** (`RenderTimeout`, `Render`, `Fetch`, `Storage`): one
//!   target's attempt failed. The retry manager may try again, and an
//!   exhausted target never stops its siblings.
//! - **Run-scoped** (`Provider`, `Config`, ...): the run cannot continue and
//!   the orchestrator faults.

use std::fmt;

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Rendering a target exceeded its hard timeout
    #[error("Render timed out for {target} after {timeout_secs}s")]
    RenderTimeout { target: String, timeout_secs: u64 },

    /// Navigation or network failure before any asset was collected
    #[error("Render failed for {target}: {message}")]
    Render { target: String, message: String },

    /// A discovered asset could not be downloaded
    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// A blob store list/get/put/delete call failed
    #[error("Storage error on '{key}': {message}")]
    Storage { key: String, message: String },

    /// Target list or checkpoint store unreachable
    #[error("Provider error: {0}")]
    Provider(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a render timeout error.
    pub fn render_timeout(target: impl Into<String>, timeout_secs: u64) -> Self {
        Self::RenderTimeout {
            target: target.into(),
            timeout_secs,
        }
    }

    /// Create a render failure.
    pub fn render(target: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Render {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Create an asset fetch failure.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a storage failure for the given key or prefix.
    pub fn storage(key: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Storage {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Create a provider failure.
    pub fn provider(message: impl fmt::Display) -> Self {
        Self::Provider(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether another attempt at the same target may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RenderTimeout { .. }
                | Self::Render { .. }
                | Self::Fetch { .. }
                | Self::Storage { .. }
                | Self::Io(_)
                | Self::Http(_)
        )
    }

    /// Short machine-friendly name of the error kind, used in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RenderTimeout { .. } => "render_timeout",
            Self::Render { .. } => "render_failure",
            Self::Fetch { .. } => "fetch_failure",
            Self::Storage { .. } => "storage_failure",
            Self::Provider(_) => "provider_failure",
            Self::Io(_) => "io",
            Self::Http(_) => "http",
            Self::Json(_) => "json",
            Self::Toml(_) => "toml",
            Self::Url(_) => "url",
            Self::Config(_) => "config",
            Self::Validation(_) => "validation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_scoped_errors_are_retryable() {
        assert!(AppError::render_timeout("t", 5).is_retryable());
        assert!(AppError::render("t", "boom").is_retryable());
        assert!(AppError::fetch("https://x/a.jpg", "404").is_retryable());
        assert!(AppError::storage("aldi/1/a.jpg", "denied").is_retryable());
    }

    #[test]
    fn test_run_scoped_errors_are_not_retryable() {
        assert!(!AppError::provider("sanity down").is_retryable());
        assert!(!AppError::config("bad").is_retryable());
        assert!(!AppError::validation("bad").is_retryable());
    }

    #[test]
    fn test_display_includes_context() {
        let err = AppError::render_timeout("store-42", 60);
        assert_eq!(err.to_string(), "Render timed out for store-42 after 60s");
        assert_eq!(err.kind(), "render_timeout");
    }
}
