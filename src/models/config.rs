//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Run sizing, concurrency and retry behavior
    #[serde(default)]
    pub sync: SyncConfig,

    /// HTTP client settings shared by the renderer and the asset fetcher
    #[serde(default)]
    pub http: HttpConfig,

    /// Page rendering settings
    #[serde(default)]
    pub render: RenderConfig,

    /// Rules selecting which observed URLs are assets of interest
    #[serde(default)]
    pub acceptance: AcceptanceConfig,

    /// Blob store location and key layout
    #[serde(default)]
    pub storage: StorageConfig,

    /// Where the target list comes from
    #[serde(default)]
    pub targets: TargetsConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.sync.max_items_per_run == 0 {
            return Err(AppError::validation("sync.max_items_per_run must be > 0"));
        }
        if self.sync.concurrency == 0 {
            return Err(AppError::validation("sync.concurrency must be > 0"));
        }
        if self.sync.max_attempts == 0 {
            return Err(AppError::validation("sync.max_attempts must be > 0"));
        }
        if self.sync.retry_pass_attempts > 0 {
            if self.sync.retry_pass_attempts > self.sync.max_attempts {
                return Err(AppError::validation(
                    "sync.retry_pass_attempts must not exceed sync.max_attempts",
                ));
            }
            if self.sync.retry_pass_concurrency == 0
                || self.sync.retry_pass_concurrency > self.sync.concurrency
            {
                return Err(AppError::validation(
                    "sync.retry_pass_concurrency must be between 1 and sync.concurrency",
                ));
            }
        }
        if self.sync.asset_concurrency == 0 {
            return Err(AppError::validation("sync.asset_concurrency must be > 0"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.render.timeout_secs == 0 {
            return Err(AppError::validation("render.timeout_secs must be > 0"));
        }
        if self.render.engine == RenderEngine::Browser
            && self.render.settle() >= self.render.timeout()
        {
            return Err(AppError::validation(
                "render.settle_ms must be shorter than render.timeout_secs",
            ));
        }
        if self.acceptance.required_substring.is_empty() {
            return Err(AppError::validation(
                "acceptance.required_substring is empty",
            ));
        }
        if self.acceptance.size_marker.is_empty() {
            return Err(AppError::validation("acceptance.size_marker is empty"));
        }
        if self.storage.checkpoint_key.trim_matches('/').is_empty() {
            return Err(AppError::validation("storage.checkpoint_key is empty"));
        }
        if self.storage.backend == StorageBackend::S3 && self.storage.bucket.is_empty() {
            return Err(AppError::validation(
                "storage.bucket is required for the s3 backend",
            ));
        }
        match self.targets.source {
            TargetSource::Sanity => {
                if self.targets.sanity.project_id.is_empty() {
                    return Err(AppError::validation("targets.sanity.project_id is empty"));
                }
                if self.targets.sanity.dataset.is_empty() {
                    return Err(AppError::validation("targets.sanity.dataset is empty"));
                }
                if !self.targets.url_template.contains("{code}") {
                    return Err(AppError::validation(
                        "targets.url_template must contain a {code} placeholder",
                    ));
                }
            }
            TargetSource::File => {
                if self.targets.file.as_os_str().is_empty() {
                    return Err(AppError::validation("targets.file is empty"));
                }
            }
        }
        Ok(())
    }
}

/// Run sizing, concurrency and retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum number of targets a single invocation attempts
    #[serde(default = "defaults::max_items_per_run")]
    pub max_items_per_run: usize,

    /// Targets per checkpointed batch inside a run (0 = whole run slice)
    #[serde(default)]
    pub batch_size: usize,

    /// Concurrent per-target tasks in the first pass
    #[serde(default = "defaults::concurrency")]
    pub concurrency: usize,

    /// Attempts per target in the first pass
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Concurrent per-target tasks in the retry pass
    #[serde(default = "defaults::retry_pass_concurrency")]
    pub retry_pass_concurrency: usize,

    /// Attempts per target in the retry pass (0 disables the pass)
    #[serde(default = "defaults::retry_pass_attempts")]
    pub retry_pass_attempts: u32,

    /// Fixed pause between attempts in milliseconds
    #[serde(default = "defaults::retry_pause_ms")]
    pub retry_pause_ms: u64,

    /// Concurrent asset downloads within one target
    #[serde(default = "defaults::asset_concurrency")]
    pub asset_concurrency: usize,

    /// Allow an empty render to delete every object in the target's folder
    #[serde(default)]
    pub prune_on_empty: bool,
}

impl SyncConfig {
    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_items_per_run: defaults::max_items_per_run(),
            batch_size: 0,
            concurrency: defaults::concurrency(),
            max_attempts: defaults::max_attempts(),
            retry_pass_concurrency: defaults::retry_pass_concurrency(),
            retry_pass_attempts: defaults::retry_pass_attempts(),
            retry_pause_ms: defaults::retry_pause_ms(),
            asset_concurrency: defaults::asset_concurrency(),
            prune_on_empty: false,
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// How pages are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RenderEngine {
    /// Fetch the HTML and read static references from the markup
    #[default]
    Http,
    /// Load the page in headless Chromium and record its network requests
    Browser,
}

impl std::str::FromStr for RenderEngine {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "browser" => Ok(Self::Browser),
            other => Err(AppError::config(format!("unknown render engine: {}", other))),
        }
    }
}

/// Page rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub engine: RenderEngine,

    /// Hard limit for rendering one target, in seconds
    #[serde(default = "defaults::render_timeout")]
    pub timeout_secs: u64,

    /// How long the browser keeps recording after navigation, in milliseconds
    #[serde(default = "defaults::settle_ms")]
    pub settle_ms: u64,

    /// Chromium executable; looked up on the system when unset
    #[serde(default)]
    pub chromium_path: Option<PathBuf>,
}

impl RenderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            engine: RenderEngine::default(),
            timeout_secs: defaults::render_timeout(),
            settle_ms: defaults::settle_ms(),
            chromium_path: None,
        }
    }
}

/// Substring rules for the acceptance filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptanceConfig {
    /// Host/path fragment every accepted URL must contain
    #[serde(default = "defaults::required_substring")]
    pub required_substring: String,

    /// Size-variant marker every accepted URL must contain
    #[serde(default = "defaults::size_marker")]
    pub size_marker: String,

    /// Variant marker that disqualifies a URL (empty = no exclusion)
    #[serde(default = "defaults::excluded_marker")]
    pub excluded_marker: String,
}

impl Default for AcceptanceConfig {
    fn default() -> Self {
        Self {
            required_substring: defaults::required_substring(),
            size_marker: defaults::size_marker(),
            excluded_marker: defaults::excluded_marker(),
        }
    }
}

/// Supported blob store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
}

/// Blob store location and key layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the local backend
    #[serde(default = "defaults::local_root")]
    pub local_root: PathBuf,

    /// Bucket name for the s3 backend
    #[serde(default)]
    pub bucket: String,

    /// Custom endpoint (e.g. Cloudflare R2)
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Region for the s3 backend
    #[serde(default = "defaults::region")]
    pub region: String,

    /// Key prefix shared by all target folders and the checkpoint
    #[serde(default = "defaults::prefix")]
    pub prefix: String,

    /// Checkpoint object key, relative to `prefix`
    #[serde(default = "defaults::checkpoint_key")]
    pub checkpoint_key: String,

    /// Public base URL used when reporting uploaded objects
    #[serde(default)]
    pub public_url: Option<String>,
}

impl StorageConfig {
    fn join(&self, rest: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        let rest = rest.trim_start_matches('/');
        if prefix.is_empty() {
            rest.to_string()
        } else {
            format!("{}/{}", prefix, rest)
        }
    }

    /// Listing prefix for a target folder, always ending in `/`.
    pub fn folder_prefix(&self, folder: &str) -> String {
        format!("{}/", self.join(folder.trim_matches('/')))
    }

    /// Full object key for a file inside a target folder.
    pub fn object_key(&self, folder: &str, file_name: &str) -> String {
        format!("{}{}", self.folder_prefix(folder), file_name)
    }

    /// Full key of the checkpoint object.
    pub fn checkpoint_object_key(&self) -> String {
        self.join(&self.checkpoint_key)
    }

    /// Public URL for a key, or the key itself when no public URL is set.
    pub fn public_location(&self, key: &str) -> String {
        match &self.public_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => key.to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_root: defaults::local_root(),
            bucket: String::new(),
            endpoint_url: None,
            region: defaults::region(),
            prefix: defaults::prefix(),
            checkpoint_key: defaults::checkpoint_key(),
            public_url: None,
        }
    }
}

/// Supported target-list sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetSource {
    Sanity,
    #[default]
    File,
}

/// Where the target list comes from and how targets are keyed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetsConfig {
    #[serde(default)]
    pub source: TargetSource,

    /// Path of a URL list or CSV file
    #[serde(default = "defaults::targets_file")]
    pub file: PathBuf,

    /// CSV column holding the URL; unset means one URL per line
    #[serde(default)]
    pub csv_column: Option<usize>,

    /// Page URL for a store code, `{code}` is substituted
    #[serde(default = "defaults::url_template")]
    pub url_template: String,

    /// Query parameter whose value becomes the folder key of a URL target
    #[serde(default = "defaults::folder_key_param")]
    pub folder_key_param: String,

    #[serde(default)]
    pub sanity: SanityConfig,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            source: TargetSource::default(),
            file: defaults::targets_file(),
            csv_column: None,
            url_template: defaults::url_template(),
            folder_key_param: defaults::folder_key_param(),
            sanity: SanityConfig::default(),
        }
    }
}

/// Sanity content-lake connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanityConfig {
    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub dataset: String,

    #[serde(default = "defaults::sanity_api_version")]
    pub api_version: String,

    /// GROQ query returning objects with a `storeCode` field
    #[serde(default = "defaults::sanity_query")]
    pub query: String,

    /// API token, read from the environment only
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for SanityConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            dataset: String::new(),
            api_version: defaults::sanity_api_version(),
            query: defaults::sanity_query(),
            token: None,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Sync defaults
    pub fn max_items_per_run() -> usize {
        100
    }
    pub fn concurrency() -> usize {
        5
    }
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn retry_pass_concurrency() -> usize {
        2
    }
    pub fn retry_pass_attempts() -> u32 {
        2
    }
    pub fn retry_pause_ms() -> u64 {
        1000
    }
    pub fn asset_concurrency() -> usize {
        4
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; adsync/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Render defaults
    pub fn render_timeout() -> u64 {
        60
    }
    pub fn settle_ms() -> u64 {
        8000
    }

    // Acceptance defaults
    pub fn required_substring() -> String {
        "akimages.shoplocal.com".into()
    }
    pub fn size_marker() -> String {
        "1200.0.90.0".into()
    }
    pub fn excluded_marker() -> String {
        "HB".into()
    }

    // Storage defaults
    pub fn local_root() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn region() -> String {
        "auto".into()
    }
    pub fn prefix() -> String {
        "aldi".into()
    }
    pub fn checkpoint_key() -> String {
        "_state/checkpoint.json".into()
    }

    // Target defaults
    pub fn targets_file() -> PathBuf {
        PathBuf::from("data/targets.txt")
    }
    pub fn url_template() -> String {
        "https://aldi.us/weekly-specials/our-weekly-ads/?storeref={code}".into()
    }
    pub fn folder_key_param() -> String {
        "storeref".into()
    }
    pub fn sanity_api_version() -> String {
        "2024-04-30".into()
    }
    pub fn sanity_query() -> String {
        r#"*[_type=="store" && defined(storeCode)] | order(storeCode asc){storeCode}"#.into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sync.max_items_per_run, 100);
        assert_eq!(config.acceptance.excluded_marker, "HB");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [sync]
            max_items_per_run = 25

            [storage]
            backend = "s3"
            bucket = "flyers"
            "#,
        )
        .unwrap();

        assert_eq!(config.sync.max_items_per_run, 25);
        assert_eq!(config.sync.concurrency, 5);
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.prefix, "aldi");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.sync.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_retry_pass_budget() {
        let mut config = Config::default();
        config.sync.retry_pass_attempts = config.sync.max_attempts + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sync.retry_pass_concurrency = config.sync.concurrency + 1;
        assert!(config.validate().is_err());

        // Ignored when the retry pass is disabled.
        config.sync.retry_pass_attempts = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_browser_settle_must_fit_in_timeout() {
        let mut config: Config = toml::from_str(
            r#"
            [render]
            engine = "browser"
            timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.render.engine, RenderEngine::Browser);
        assert!(config.validate().is_err());

        config.render.settle_ms = 2000;
        assert!(config.validate().is_ok());
        assert_eq!("Browser".parse::<RenderEngine>().unwrap(), RenderEngine::Browser);
        assert!("webkit".parse::<RenderEngine>().is_err());
    }

    #[test]
    fn test_validate_requires_bucket_for_s3() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::S3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_sanity_project() {
        let mut config = Config::default();
        config.targets.source = TargetSource::Sanity;
        assert!(config.validate().is_err());

        config.targets.sanity.project_id = "abc".into();
        config.targets.sanity.dataset = "production".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_key_layout() {
        let storage = StorageConfig::default();
        assert_eq!(storage.folder_prefix("1234"), "aldi/1234/");
        assert_eq!(storage.object_key("1234", "a.jpg"), "aldi/1234/a.jpg");
        assert_eq!(storage.checkpoint_object_key(), "aldi/_state/checkpoint.json");

        let bare = StorageConfig {
            prefix: String::new(),
            public_url: Some("https://cdn.example.com/".into()),
            ..StorageConfig::default()
        };
        assert_eq!(bare.object_key("x", "a.jpg"), "x/a.jpg");
        assert_eq!(
            bare.public_location("x/a.jpg"),
            "https://cdn.example.com/x/a.jpg"
        );
    }
}
