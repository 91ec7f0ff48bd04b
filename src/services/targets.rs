// src/services/targets.rs

//! Target-list providers.
//!
//! Every failure while producing the list is a [`AppError::Provider`]; the run
//! cannot proceed without a list.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{SanityConfig, Target, TargetSource, TargetsConfig};

/// Produces the ordered list of targets for a run.
#[async_trait]
pub trait TargetProvider: Send + Sync {
    async fn load_targets(&self) -> Result<Vec<Target>>;
}

/// Build the provider selected by `targets.source`.
pub fn from_config(config: &TargetsConfig, client: Client) -> Arc<dyn TargetProvider> {
    match config.source {
        TargetSource::Sanity => Arc::new(SanityTargetProvider::new(
            client,
            config.sanity.clone(),
            config.url_template.clone(),
        )),
        TargetSource::File => Arc::new(FileTargetProvider::new(
            config.file.clone(),
            config.csv_column,
        )),
    }
}

/// Fixed in-memory list.
#[derive(Debug, Clone, Default)]
pub struct StaticTargetProvider {
    targets: Vec<Target>,
}

impl StaticTargetProvider {
    pub fn new(targets: Vec<Target>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl TargetProvider for StaticTargetProvider {
    async fn load_targets(&self) -> Result<Vec<Target>> {
        Ok(self.targets.clone())
    }
}

/// URL list or CSV file on disk.
#[derive(Debug, Clone)]
pub struct FileTargetProvider {
    path: PathBuf,
    csv_column: Option<usize>,
}

impl FileTargetProvider {
    pub fn new(path: impl Into<PathBuf>, csv_column: Option<usize>) -> Self {
        Self {
            path: path.into(),
            csv_column,
        }
    }
}

#[async_trait]
impl TargetProvider for FileTargetProvider {
    async fn load_targets(&self) -> Result<Vec<Target>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AppError::provider(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let targets = parse_target_list(&content, self.csv_column);
        log::info!(
            "Loaded {} targets from {}",
            targets.len(),
            self.path.display()
        );
        Ok(targets)
    }
}

/// Parse a URL list (one per line) or, with `csv_column`, one CSV column.
///
/// Skips blank lines, `#` comments and anything that is not an http(s) URL,
/// which drops header rows and placeholder values. Keeps the first
/// occurrence of duplicates.
pub fn parse_target_list(content: &str, csv_column: Option<usize>) -> Vec<Target> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match csv_column {
            Some(column) => csv_fields(line).into_iter().nth(column),
            None => Some(line.to_string()),
        })
        .map(|value| value.trim().to_string())
        .filter(|value| is_http_url(value))
        .filter(|value| seen.insert(value.clone()))
        .map(Target::new)
        .collect()
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

/// Split one CSV record, honouring double-quoted fields.
fn csv_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', _) => quoted = !quoted,
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Store codes from a Sanity dataset, one target per code.
pub struct SanityTargetProvider {
    client: Client,
    config: SanityConfig,
    url_template: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: Vec<StoreRecord>,
}

#[derive(Debug, Deserialize)]
struct StoreRecord {
    #[serde(rename = "storeCode")]
    store_code: Option<Value>,
}

impl SanityTargetProvider {
    pub fn new(client: Client, config: SanityConfig, url_template: String) -> Self {
        Self {
            client,
            config,
            url_template,
        }
    }

    fn query_url(&self) -> Result<Url> {
        let base = format!(
            "https://{}.api.sanity.io/v{}/data/query/{}",
            self.config.project_id,
            self.config.api_version.trim_start_matches('v'),
            self.config.dataset
        );
        let mut url = Url::parse(&base)?;
        url.query_pairs_mut().append_pair("query", &self.config.query);
        Ok(url)
    }
}

#[async_trait]
impl TargetProvider for SanityTargetProvider {
    async fn load_targets(&self) -> Result<Vec<Target>> {
        let url = self
            .query_url()
            .map_err(|e| AppError::provider(format!("invalid Sanity query URL: {}", e)))?;

        let mut request = self.client.get(url);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let body = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::provider(format!("Sanity query failed: {}", e)))?
            .bytes()
            .await
            .map_err(|e| AppError::provider(format!("Sanity response unreadable: {}", e)))?;
        let response: QueryResponse = serde_json::from_slice(&body)
            .map_err(|e| AppError::provider(format!("Sanity response malformed: {}", e)))?;

        let codes = store_codes(response.result);
        log::info!("Loaded {} store codes from Sanity", codes.len());
        Ok(codes
            .into_iter()
            .map(|code| Target::with_folder(self.url_template.replace("{code}", &code), code))
            .collect())
    }
}

fn store_codes(records: Vec<StoreRecord>) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter_map(|r| match r.store_code? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|code| !code.is_empty())
        .filter(|code| seen.insert(code.clone()))
        .collect()
}
