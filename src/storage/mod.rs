//! Blob store abstractions.
//!
//! The sync engine only needs four operations from a backend: list by
//! prefix, get, put and delete. Nothing here is conditional; concurrent
//! writers to the same key follow last-write-wins.
//!
//! ## Key Layout
//!
//! ```text
//! {prefix}/
//! ├── _state/
//! │   └── checkpoint.json   # Resumable cursor over the target list
//! ├── 4821/                 # One folder per target
//! │   ├── p1.jpg
//! │   └── p2.jpg
//! └── 5530/
//!     └── p1.jpg
//! ```

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{StorageBackend, StorageConfig, StoredObject};

// Re-export for convenience
pub use local::LocalStorage;

/// Trait for blob storage backends.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List every object whose key starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>>;

    /// Read an object, returning `None` if it does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Create or overwrite an object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Human-readable location of a key, for logs.
    fn location(&self, key: &str) -> String {
        key.to_string()
    }
}

/// Build the configured blob store.
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalStorage::new(&config.local_root))),
        #[cfg(feature = "s3")]
        StorageBackend::S3 => Ok(Arc::new(s3::S3Storage::from_config(config).await?)),
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => Err(crate::error::AppError::config(
            "storage.backend = \"s3\" requires the `s3` feature",
        )),
    }
}
