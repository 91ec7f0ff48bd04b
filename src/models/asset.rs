// src/models/asset.rs

use serde::{Deserialize, Serialize};

use crate::utils::file_name_from_url;

/// Kind of a network request seen while rendering a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Document,
    Image,
    Script,
    Stylesheet,
    Other,
}

/// A request observed during rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObservedRequest {
    pub url: String,
    pub resource_type: ResourceType,
}

impl ObservedRequest {
    pub fn new(url: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            url: url.into(),
            resource_type,
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::new(url, ResourceType::Image)
    }
}

/// An accepted asset after its content has been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredAsset {
    pub url: String,
    /// Last path segment of `url`
    pub file_name: String,
    pub byte_size: u64,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl DiscoveredAsset {
    /// Build an asset from fetched content. Returns `None` when the URL has
    /// no usable file name.
    pub fn from_fetched(
        url: impl Into<String>,
        bytes: Vec<u8>,
        content_type: impl Into<String>,
    ) -> Option<Self> {
        let url = url.into();
        let file_name = file_name_from_url(&url)?;
        Some(Self {
            byte_size: bytes.len() as u64,
            file_name,
            url,
            content_type: content_type.into(),
            bytes,
        })
    }
}

/// An object currently present in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub byte_size: u64,
}

impl StoredObject {
    pub fn new(key: impl Into<String>, byte_size: u64) -> Self {
        Self {
            key: key.into(),
            byte_size,
        }
    }

    /// Last `/`-separated segment of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_object_file_name() {
        assert_eq!(StoredObject::new("aldi/1/a.jpg", 1).file_name(), "a.jpg");
        assert_eq!(StoredObject::new("a.jpg", 1).file_name(), "a.jpg");
    }

    #[test]
    fn test_discovered_asset_from_fetched() {
        let asset = DiscoveredAsset::from_fetched(
            "https://akimages.shoplocal.com/x/1200.0.90.0/p1.jpg?v=2",
            vec![0u8; 42],
            "image/jpeg",
        )
        .unwrap();
        assert_eq!(asset.file_name, "p1.jpg");
        assert_eq!(asset.byte_size, 42);
    }

    #[test]
    fn test_discovered_asset_without_name() {
        assert!(DiscoveredAsset::from_fetched("https://example.com/", vec![], "image/jpeg").is_none());
    }
}
