// src/models/target.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::utils::query_param;

/// One page to synchronize: an opaque locator plus an optional storage folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// URL (or identifier) handed to the renderer
    pub locator: String,
    /// Explicit storage namespace; derived from the locator when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_key: Option<String>,
}

impl Target {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            folder_key: None,
        }
    }

    pub fn with_folder(locator: impl Into<String>, folder_key: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            folder_key: Some(folder_key.into()),
        }
    }

    /// Storage folder for this target.
    ///
    /// Preference order: explicit folder key, the value of `key_param` in the
    /// locator's query string, then a short SHA-256 digest of the locator.
    /// The result only contains `[A-Za-z0-9._-]`.
    pub fn storage_folder(&self, key_param: &str) -> String {
        let raw = self
            .folder_key
            .clone()
            .or_else(|| query_param(&self.locator, key_param))
            .map(|key| sanitize(&key))
            .filter(|key| !key.is_empty());

        raw.unwrap_or_else(|| {
            let digest = Sha256::digest(self.locator.as_bytes());
            hex::encode(digest)[..16].to_string()
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.folder_key {
            Some(key) => write!(f, "{} ({})", self.locator, key),
            None => f.write_str(&self.locator),
        }
    }
}

fn sanitize(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_folder_wins() {
        let target = Target::with_folder("https://aldi.us/ads/?storeref=999", "W 42");
        assert_eq!(target.storage_folder("storeref"), "W_42");
    }

    #[test]
    fn test_folder_from_query_param() {
        let target = Target::new("https://aldi.us/weekly-specials/our-weekly-ads/?storeref=4821");
        assert_eq!(target.storage_folder("storeref"), "4821");
    }

    #[test]
    fn test_folder_falls_back_to_digest() {
        let target = Target::new("https://example.com/store/7");
        let folder = target.storage_folder("storeref");
        assert_eq!(folder.len(), 16);
        assert!(folder.chars().all(|c| c.is_ascii_hexdigit()));
        // Stable across calls
        assert_eq!(folder, target.storage_folder("storeref"));
    }

    #[test]
    fn test_dot_segments_are_neutralized() {
        let target = Target::with_folder("x", "..");
        let folder = target.storage_folder("storeref");
        assert_ne!(folder, "..");
        assert_eq!(folder.len(), 16);
    }
}
