//! AWS S3 storage implementation.
//!
//! Works against AWS S3 and S3-compatible services. For Cloudflare R2 set
//! `storage.endpoint_url` (or `CF_R2_ENDPOINT`) and provide credentials via
//! `CF_R2_ACCESS_KEY` / `CF_R2_SECRET_ACCESS_KEY`; region defaults to `auto`.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use log::{debug, info};

use crate::error::{AppError, Result};
use crate::models::{StorageConfig, StoredObject};
use crate::storage::BlobStore;

/// S3-backed blob store.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3 storage instance.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Create S3 storage from configuration plus the environment.
    ///
    /// Static credentials are taken from `CF_R2_ACCESS_KEY` and
    /// `CF_R2_SECRET_ACCESS_KEY` when both are set; otherwise the default
    /// AWS credential chain applies.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        if config.bucket.is_empty() {
            return Err(AppError::config("storage.bucket is not set"));
        }

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        if let (Ok(access_key), Ok(secret_key)) = (
            std::env::var("CF_R2_ACCESS_KEY"),
            std::env::var("CF_R2_SECRET_ACCESS_KEY"),
        ) {
            loader = loader.credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "env-r2",
            ));
        }

        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.endpoint_url.is_some())
            .build();

        info!(
            "Using S3 storage: bucket={}, endpoint={}",
            config.bucket,
            config.endpoint_url.as_deref().unwrap_or("aws")
        );

        Ok(Self::new(Client::from_conf(s3_config), config.bucket.clone()))
    }
}

#[async_trait]
impl BlobStore for S3Storage {
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| AppError::storage(prefix, e.into_service_error()))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    let size = object.size().unwrap_or(0).max(0) as u64;
                    objects.push(StoredObject::new(key, size));
                }
            }
        }

        debug!(
            "Listed {} objects under s3://{}/{}",
            objects.len(),
            self.bucket,
            prefix
        );
        Ok(objects)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::storage(key, e))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                // Check if it's a "not found" error
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    debug!("No object at s3://{}/{}", self.bucket, key);
                    Ok(None)
                } else {
                    Err(AppError::storage(key, service_err))
                }
            }
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::storage(key, e.into_service_error()))?;

        debug!("Wrote {} bytes to s3://{}/{}", size, self.bucket, key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::storage(key, e.into_service_error()))?;

        debug!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}
