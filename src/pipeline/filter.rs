// src/pipeline/filter.rs

//! Acceptance filter for observed requests.
//!
//! A request is an asset of interest when it was an image request, its URL
//! contains the required host/path fragment and the size-variant marker, and
//! it does not contain the excluded-variant marker. Plain substring tests;
//! anything else is dropped silently.

use std::collections::HashSet;

use crate::models::{AcceptanceConfig, ObservedRequest, ResourceType};

#[derive(Debug, Clone)]
pub struct AcceptanceFilter {
    required: String,
    size_marker: String,
    excluded: String,
}

impl AcceptanceFilter {
    pub fn new(config: &AcceptanceConfig) -> Self {
        Self {
            required: config.required_substring.clone(),
            size_marker: config.size_marker.clone(),
            excluded: config.excluded_marker.clone(),
        }
    }

    /// URL-only part of the policy (conditions b and c).
    pub fn accepts_url(&self, url: &str) -> bool {
        url.contains(&self.required)
            && url.contains(&self.size_marker)
            && (self.excluded.is_empty() || !url.contains(&self.excluded))
    }

    /// Full policy: must also have been observed as an image request.
    pub fn accept(&self, request: &ObservedRequest) -> bool {
        request.resource_type == ResourceType::Image && self.accepts_url(&request.url)
    }

    /// Accepted URLs in observation order, without duplicates.
    pub fn select(&self, requests: &[ObservedRequest]) -> Vec<String> {
        let mut seen = HashSet::new();
        requests
            .iter()
            .filter(|r| self.accept(r))
            .filter(|r| seen.insert(r.url.as_str()))
            .map(|r| r.url.clone())
            .collect()
    }
}

impl Default for AcceptanceFilter {
    fn default() -> Self {
        Self::new(&AcceptanceConfig::default())
    }
}
