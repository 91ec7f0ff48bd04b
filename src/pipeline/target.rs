// src/pipeline/target.rs

//! One attempt at synchronizing one target.
//!
//! render -> filter -> fetch -> list folder -> diff -> apply. Render, fetch and
//! list failures fail the attempt. Individual put/delete failures are logged
//! and counted; the attempt still succeeds and the next sweep's diff picks
//! them up again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::error::{AppError, Result};
use crate::models::{Config, DiscoveredAsset, StorageConfig, StoredObject, Target, TargetReport};
use crate::pipeline::diff::compute_diff;
use crate::pipeline::filter::AcceptanceFilter;
use crate::pipeline::scheduler::TargetProcessor;
use crate::services::{AssetFetcher, PageRenderer, render_scoped};
use crate::storage::BlobStore;

/// Mirrors a target's accepted assets into its storage folder.
pub struct TargetSyncer {
    renderer: Arc<dyn PageRenderer>,
    fetcher: Arc<dyn AssetFetcher>,
    store: Arc<dyn BlobStore>,
    filter: AcceptanceFilter,
    storage: StorageConfig,
    folder_key_param: String,
    render_timeout: Duration,
    asset_concurrency: usize,
    prune_on_empty: bool,
}

impl TargetSyncer {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        fetcher: Arc<dyn AssetFetcher>,
        store: Arc<dyn BlobStore>,
        config: &Config,
    ) -> Self {
        Self {
            renderer,
            fetcher,
            store,
            filter: AcceptanceFilter::new(&config.acceptance),
            storage: config.storage.clone(),
            folder_key_param: config.targets.folder_key_param.clone(),
            render_timeout: config.render.timeout(),
            asset_concurrency: config.sync.asset_concurrency.max(1),
            prune_on_empty: config.sync.prune_on_empty,
        }
    }

    async fn discover(&self, target: &Target) -> Result<Vec<DiscoveredAsset>> {
        let observed = render_scoped(self.renderer.as_ref(), target, self.render_timeout).await?;
        let accepted = self.filter.select(&observed);
        log::debug!(
            "{}: {} requests observed, {} accepted",
            target.locator,
            observed.len(),
            accepted.len()
        );

        let fetcher = &self.fetcher;
        let fetched: Vec<_> = stream::iter(accepted)
            .map(|url| async move {
                let asset = fetcher.fetch(&url).await.map_err(|e| match e {
                    AppError::Fetch { .. } => e,
                    other => AppError::fetch(&url, other),
                })?;
                Ok::<_, AppError>((url, asset))
            })
            .buffered(self.asset_concurrency)
            .try_collect()
            .await?;

        Ok(fetched
            .into_iter()
            .filter_map(|(url, asset)| {
                let discovered = DiscoveredAsset::from_fetched(&url, asset.bytes, asset.content_type);
                if discovered.is_none() {
                    log::warn!("Skipping asset without a file name: {}", url);
                }
                discovered
            })
            .collect())
    }

    /// Objects stored directly under the folder; nested keys are left alone.
    async fn existing(&self, folder_prefix: &str) -> Result<Vec<StoredObject>> {
        let objects = self.store.list(folder_prefix).await.map_err(|e| match e {
            AppError::Storage { .. } => e,
            other => AppError::storage(folder_prefix, other),
        })?;
        Ok(objects
            .into_iter()
            .filter(|o| {
                o.key
                    .strip_prefix(folder_prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .collect())
    }
}

#[async_trait]
impl TargetProcessor for TargetSyncer {
    async fn process(&self, target: &Target) -> Result<TargetReport> {
        let folder = target.storage_folder(&self.folder_key_param);
        let folder_prefix = self.storage.folder_prefix(&folder);
        if self
            .storage
            .checkpoint_object_key()
            .starts_with(&folder_prefix)
        {
            return Err(AppError::validation(format!(
                "{}: folder '{}' is reserved for the checkpoint",
                target.locator, folder
            )));
        }

        let discovered = self.discover(target).await?;
        let existing = self.existing(&folder_prefix).await?;

        if discovered.is_empty() && !existing.is_empty() && !self.prune_on_empty {
            return Err(AppError::render(&target.locator, "no assets collected"));
        }

        let plan = compute_diff(&existing, &discovered);
        let mut report = TargetReport {
            target: target.locator.clone(),
            folder: folder.clone(),
            discovered: discovered.len(),
            unchanged: plan.unchanged.len(),
            ..TargetReport::default()
        };

        let puts: Vec<_> = plan
            .to_upload
            .iter()
            .map(|asset| {
                let store = Arc::clone(&self.store);
                let key = self.storage.object_key(&folder, &asset.file_name);
                let bytes = asset.bytes.clone();
                let content_type = asset.content_type.clone();
                async move {
                    let result = store.put(&key, bytes, &content_type).await;
                    (key, result)
                }
                .boxed()
            })
            .collect();
        let mut uploads = stream::iter(puts).buffer_unordered(self.asset_concurrency);
        while let Some((key, result)) = uploads.next().await {
            match result {
                Ok(()) => {
                    report.uploaded += 1;
                    report.uploaded_urls.push(self.storage.public_location(&key));
                }
                Err(e) => {
                    report.upload_failures += 1;
                    log::warn!("Upload of {} failed: {}", key, e);
                }
            }
        }
        report.uploaded_urls.sort();

        for object in &plan.to_delete {
            match self.store.delete(&object.key).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    report.delete_failures += 1;
                    log::warn!("Delete of {} failed: {}", object.key, e);
                }
            }
        }

        log::info!(
            "{} -> {}: {} uploaded, {} deleted, {} unchanged",
            target.locator,
            folder_prefix,
            report.uploaded,
            report.deleted,
            report.unchanged
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    use tempfile::TempDir;

    use crate::models::ObservedRequest;
    use crate::services::{FetchedAsset, RenderSession};
    use crate::storage::LocalStorage;

    const HOST: &str = "https://akimages.shoplocal.com/1200.0.90.0";

    #[derive(Default)]
    struct FakeRenderer {
        pages: Arc<HashMap<String, Vec<ObservedRequest>>>,
    }

    struct FakeSession {
        pages: Arc<HashMap<String, Vec<ObservedRequest>>>,
    }

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn open(&self) -> Result<Box<dyn RenderSession>> {
            Ok(Box::new(FakeSession {
                pages: Arc::clone(&self.pages),
            }))
        }
    }

    #[async_trait]
    impl RenderSession for FakeSession {
        async fn collect(&mut self, target: &Target) -> Result<Vec<ObservedRequest>> {
            Ok(self.pages.get(&target.locator).cloned().unwrap_or_default())
        }

        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeFetcher {
        sizes: HashMap<String, usize>,
        broken: HashSet<String>,
    }

    #[async_trait]
    impl AssetFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedAsset> {
            if self.broken.contains(url) {
                return Err(AppError::fetch(url, "connection reset"));
            }
            let size = self.sizes.get(url).copied().unwrap_or(1);
            Ok(FetchedAsset {
                bytes: vec![b'x'; size],
                content_type: "image/jpeg".into(),
            })
        }
    }

    struct Fixture {
        _tmp: TempDir,
        storage: Arc<LocalStorage>,
        target: Target,
    }

    impl Fixture {
        async fn new(existing: &[(&str, usize)]) -> Self {
            let tmp = TempDir::new().unwrap();
            let storage = Arc::new(LocalStorage::new(tmp.path()));
            for (key, size) in existing {
                storage
                    .put(key, vec![b'o'; *size], "image/jpeg")
                    .await
                    .unwrap();
            }
            Self {
                _tmp: tmp,
                storage,
                target: Target::with_folder(
                    "https://aldi.us/weekly-specials/our-weekly-ads/?storeref=423",
                    "423",
                ),
            }
        }

        fn syncer(
            &self,
            page: Vec<ObservedRequest>,
            fetcher: FakeFetcher,
            config: &Config,
        ) -> TargetSyncer {
            let pages = HashMap::from([(self.target.locator.clone(), page)]);
            TargetSyncer::new(
                Arc::new(FakeRenderer {
                    pages: Arc::new(pages),
                }),
                Arc::new(fetcher),
                self.storage.clone(),
                config,
            )
        }

        async fn keys(&self) -> Vec<(String, u64)> {
            self.storage
                .list("aldi/")
                .await
                .unwrap()
                .into_iter()
                .map(|o| (o.key, o.byte_size))
                .collect()
        }
    }

    fn img(name: &str) -> String {
        format!("{}/{}", HOST, name)
    }

    #[tokio::test]
    async fn test_add_keep_delete_end_to_end() {
        let fx = Fixture::new(&[("aldi/423/a.jpg", 100), ("aldi/423/b.jpg", 50)]).await;
        let fetcher = FakeFetcher {
            sizes: HashMap::from([(img("a.jpg"), 100), (img("c.jpg"), 30)]),
            ..FakeFetcher::default()
        };
        let page = vec![
            ObservedRequest::image(img("a.jpg")),
            ObservedRequest::image(img("c.jpg")),
            ObservedRequest::image(format!("{}/HB_banner.jpg", HOST)),
            ObservedRequest::image("https://aldi.us/img/logo.png"),
        ];
        let syncer = fx.syncer(page, fetcher, &Config::default());

        let report = syncer.process(&fx.target).await.unwrap();

        assert_eq!(report.folder, "423");
        assert_eq!(report.discovered, 2);
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.uploaded_urls, vec!["aldi/423/c.jpg"]);
        assert_eq!(
            fx.keys().await,
            vec![
                ("aldi/423/a.jpg".to_string(), 100),
                ("aldi/423/c.jpg".to_string(), 30)
            ]
        );

        // A second pass over the same page changes nothing.
        let report = syncer.process(&fx.target).await.unwrap();
        assert_eq!((report.uploaded, report.deleted, report.unchanged), (0, 0, 2));
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_attempt_without_deleting() {
        let fx = Fixture::new(&[("aldi/423/b.jpg", 50)]).await;
        let fetcher = FakeFetcher {
            broken: HashSet::from([img("b.jpg")]),
            ..FakeFetcher::default()
        };
        let page = vec![
            ObservedRequest::image(img("a.jpg")),
            ObservedRequest::image(img("b.jpg")),
        ];
        let syncer = fx.syncer(page, fetcher, &Config::default());

        let err = syncer.process(&fx.target).await.unwrap_err();
        assert!(matches!(err, AppError::Fetch { .. }));
        assert!(err.is_retryable());
        assert_eq!(fx.keys().await, vec![("aldi/423/b.jpg".to_string(), 50)]);
    }

    #[tokio::test]
    async fn test_empty_render_does_not_wipe_folder() {
        let fx = Fixture::new(&[("aldi/423/a.jpg", 10)]).await;
        let syncer = fx.syncer(Vec::new(), FakeFetcher::default(), &Config::default());

        let err = syncer.process(&fx.target).await.unwrap_err();
        assert!(matches!(err, AppError::Render { .. }));
        assert!(err.to_string().contains("no assets collected"));
        assert_eq!(fx.keys().await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_render_prunes_when_enabled() {
        let fx = Fixture::new(&[("aldi/423/a.jpg", 10)]).await;
        let mut config = Config::default();
        config.sync.prune_on_empty = true;
        let syncer = fx.syncer(Vec::new(), FakeFetcher::default(), &config);

        let report = syncer.process(&fx.target).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert!(fx.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_folder_and_empty_render_is_a_noop() {
        let fx = Fixture::new(&[]).await;
        let syncer = fx.syncer(Vec::new(), FakeFetcher::default(), &Config::default());

        let report = syncer.process(&fx.target).await.unwrap();
        assert_eq!(report.discovered, 0);
        assert_eq!(report.uploaded + report.deleted, 0);
    }

    #[tokio::test]
    async fn test_nested_and_sibling_keys_are_untouched() {
        let fx = Fixture::new(&[
            ("aldi/423/old/x.jpg", 5),
            ("aldi/4230/y.jpg", 5),
            ("aldi/423/z.jpg", 5),
        ])
        .await;
        let page = vec![ObservedRequest::image(img("a.jpg"))];
        let syncer = fx.syncer(page, FakeFetcher::default(), &Config::default());

        let report = syncer.process(&fx.target).await.unwrap();
        assert_eq!(report.deleted, 1);
        let keys: Vec<String> = fx.keys().await.into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["aldi/423/a.jpg", "aldi/423/old/x.jpg", "aldi/4230/y.jpg"]
        );
    }

    /// Store that rejects puts and deletes for chosen keys.
    struct PartlyBrokenStore {
        inner: Arc<LocalStorage>,
        reject_put: String,
        reject_delete: String,
    }

    #[async_trait]
    impl BlobStore for PartlyBrokenStore {
        async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
            self.inner.list(prefix).await
        }

        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
            if key == self.reject_put {
                return Err(AppError::storage(key, "access denied"));
            }
            self.inner.put(key, bytes, content_type).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            if key == self.reject_delete {
                return Err(AppError::storage(key, "access denied"));
            }
            self.inner.delete(key).await
        }
    }

    #[tokio::test]
    async fn test_single_put_and_delete_failures_do_not_fail_target() {
        let fx = Fixture::new(&[("aldi/423/old1.jpg", 5), ("aldi/423/old2.jpg", 5)]).await;
        let store = Arc::new(PartlyBrokenStore {
            inner: fx.storage.clone(),
            reject_put: "aldi/423/bad.jpg".into(),
            reject_delete: "aldi/423/old2.jpg".into(),
        });
        let page = vec![
            ObservedRequest::image(img("good.jpg")),
            ObservedRequest::image(img("bad.jpg")),
        ];
        let pages = HashMap::from([(fx.target.locator.clone(), page)]);
        let syncer = TargetSyncer::new(
            Arc::new(FakeRenderer {
                pages: Arc::new(pages),
            }),
            Arc::new(FakeFetcher::default()),
            store,
            &Config::default(),
        );

        let report = syncer.process(&fx.target).await.unwrap();

        assert_eq!(report.uploaded, 1);
        assert_eq!(report.upload_failures, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.delete_failures, 1);
        assert_eq!(report.uploaded_urls, vec!["aldi/423/good.jpg"]);
        let keys: Vec<String> = fx.keys().await.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["aldi/423/good.jpg", "aldi/423/old2.jpg"]);
    }

    #[tokio::test]
    async fn test_folder_holding_checkpoint_is_rejected() {
        let fx = Fixture::new(&[("aldi/_state/checkpoint.json", 40)]).await;
        let target = Target::with_folder("https://aldi.us/ads/?storeref=1", "_state");
        let page = vec![ObservedRequest::image(img("a.jpg"))];
        let pages = HashMap::from([(target.locator.clone(), page)]);
        let syncer = TargetSyncer::new(
            Arc::new(FakeRenderer {
                pages: Arc::new(pages),
            }),
            Arc::new(FakeFetcher::default()),
            fx.storage.clone(),
            &Config::default(),
        );

        let err = syncer.process(&target).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!err.is_retryable());
        assert_eq!(
            fx.keys().await,
            vec![("aldi/_state/checkpoint.json".to_string(), 40)]
        );
    }

    #[tokio::test]
    async fn test_public_url_in_report() {
        let fx = Fixture::new(&[]).await;
        let mut config = Config::default();
        config.storage.public_url = Some("https://cdn.example.com/".into());
        let page = vec![ObservedRequest::image(img("p1.jpg"))];
        let syncer = fx.syncer(page, FakeFetcher::default(), &config);

        let report = syncer.process(&fx.target).await.unwrap();
        assert_eq!(
            report.uploaded_urls,
            vec!["https://cdn.example.com/aldi/423/p1.jpg"]
        );
    }
}
