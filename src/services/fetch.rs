// src/services/fetch.rs

//! Asset content fetching.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use crate::error::{AppError, Result};
use crate::utils::{file_name_from_url, guess_content_type};

/// Raw content of one accepted asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAsset {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Retrieves asset bytes by URL.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset>;
}

/// Fetcher backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpAssetFetcher {
    client: Client,
}

impl HttpAssetFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::fetch(url, e))?;

        let header = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::fetch(url, e))?;

        Ok(FetchedAsset {
            content_type: resolve_content_type(url, header.as_deref()),
            bytes: bytes.to_vec(),
        })
    }
}

/// Prefer an `image/*` header, otherwise guess from the file extension.
pub fn resolve_content_type(url: &str, header: Option<&str>) -> String {
    if let Some(mime) = header
        .and_then(|h| h.split(';').next())
        .map(|h| h.trim().to_ascii_lowercase())
        .filter(|h| h.starts_with("image/"))
    {
        return mime;
    }
    let name = file_name_from_url(url).unwrap_or_default();
    guess_content_type(&name).to_string()
}
