// src/services/render.rs

//! Page rendering.
//!
//! A renderer hands out sessions; a session turns one target into the list of
//! requests observed while loading it. [`render_scoped`] owns the session
//! lifecycle: it always closes the session, whether collection succeeded,
//! failed or hit the hard timeout.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tokio::time::Instant;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, ObservedRequest, RenderEngine, ResourceType, Target};
#[cfg(feature = "browser")]
use crate::services::browser::ChromiumPageRenderer;
use crate::utils::resolve_url;

/// Source of render sessions.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Acquire a session (browser, tab, connection...).
    async fn open(&self) -> Result<Box<dyn RenderSession>>;
}

/// A single acquired rendering resource.
#[async_trait]
pub trait RenderSession: Send {
    /// Load the target and report every request observed.
    async fn collect(&mut self, target: &Target) -> Result<Vec<ObservedRequest>>;

    /// Release the underlying resource.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Acquire a session, render `target` under `timeout`, and always release.
///
/// Acquisition and collection share one deadline. Release gets its own
/// window of the same length so a stuck teardown cannot hold a worker.
pub async fn render_scoped(
    renderer: &dyn PageRenderer,
    target: &Target,
    timeout: Duration,
) -> Result<Vec<ObservedRequest>> {
    let deadline = Instant::now() + timeout;
    let timed_out = || AppError::render_timeout(&target.locator, timeout.as_secs());

    let mut session = match tokio::time::timeout_at(deadline, renderer.open()).await {
        Ok(Ok(session)) => session,
        Ok(Err(e)) => return Err(as_render_error(target, e)),
        Err(_) => return Err(timed_out()),
    };

    let result = match tokio::time::timeout_at(deadline, session.collect(target)).await {
        Ok(Ok(requests)) => Ok(requests),
        Ok(Err(e)) => Err(as_render_error(target, e)),
        Err(_) => Err(timed_out()),
    };

    match tokio::time::timeout(timeout, session.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!("Failed to release renderer for {}: {}", target.locator, e),
        Err(_) => log::warn!("Releasing renderer for {} timed out", target.locator),
    }

    result
}

/// Build the configured renderer.
pub fn from_config(config: &Config, client: reqwest::Client) -> Result<Arc<dyn PageRenderer>> {
    match config.render.engine {
        RenderEngine::Http => Ok(Arc::new(HttpPageRenderer::new(client))),
        #[cfg(feature = "browser")]
        RenderEngine::Browser => Ok(Arc::new(ChromiumPageRenderer::new(
            &config.render,
            &config.http.user_agent,
        ))),
        #[cfg(not(feature = "browser"))]
        RenderEngine::Browser => Err(AppError::config(
            "render.engine = \"browser\" needs the `browser` feature",
        )),
    }
}

fn as_render_error(target: &Target, error: AppError) -> AppError {
    match error {
        AppError::RenderTimeout { .. } | AppError::Render { .. } => error,
        other => AppError::render(&target.locator, other),
    }
}

/// Renderer that fetches the page over HTTP and reads requests from its markup.
///
/// It sees what the HTML references statically: images, sources, preloads,
/// scripts, stylesheets and image URLs inside inline styles. Requests that
/// only a running script would issue are not observed; image-like URLs found
/// in inline scripts are reported as `Other` since nothing loaded them.
#[derive(Clone)]
pub struct HttpPageRenderer {
    client: reqwest::Client,
}

impl HttpPageRenderer {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageRenderer for HttpPageRenderer {
    async fn open(&self) -> Result<Box<dyn RenderSession>> {
        Ok(Box::new(HttpRenderSession {
            client: self.client.clone(),
        }))
    }
}

struct HttpRenderSession {
    client: reqwest::Client,
}

#[async_trait]
impl RenderSession for HttpRenderSession {
    async fn collect(&mut self, target: &Target) -> Result<Vec<ObservedRequest>> {
        let page_url = Url::parse(&target.locator)
            .map_err(|e| AppError::render(&target.locator, format!("not a URL: {}", e)))?;

        let response = self
            .client
            .get(page_url.clone())
            .send()
            .await
            .map_err(|e| AppError::render(&target.locator, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::render(&target.locator, format!("HTTP {}", status)));
        }
        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| AppError::render(&target.locator, e))?;

        let mut requests = vec![ObservedRequest::new(page_url.as_str(), ResourceType::Document)];
        requests.extend(extract_requests(&final_url, &html));
        log::debug!(
            "Observed {} requests on {}",
            requests.len(),
            target.locator
        );
        Ok(requests)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

static INLINE_IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>()\\]+?\.(?:jpe?g|png|gif|webp|avif)(?:\?[^\s"'<>()\\]*)?"#)
        .expect("inline image regex is valid")
});

fn selector(s: &str) -> Selector {
    Selector::parse(s).expect("static selector is valid")
}

/// Extract observed requests from a page's markup.
pub fn extract_requests(base: &Url, html: &str) -> Vec<ObservedRequest> {
    let document = Html::parse_document(html);
    let mut requests = Vec::new();
    let mut push = |raw: &str, kind: ResourceType| {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with("data:") {
            return;
        }
        requests.push(ObservedRequest::new(resolve_url(base, raw), kind));
    };

    for img in document.select(&selector("img")) {
        let attrs = img.value();
        for attr in ["src", "data-src"] {
            if let Some(src) = attrs.attr(attr) {
                push(src, ResourceType::Image);
            }
        }
        if let Some(srcset) = attrs.attr("srcset") {
            srcset_urls(srcset).for_each(|u| push(u, ResourceType::Image));
        }
    }

    for source in document.select(&selector("source[srcset]")) {
        if let Some(srcset) = source.value().attr("srcset") {
            srcset_urls(srcset).for_each(|u| push(u, ResourceType::Image));
        }
    }

    for link in document.select(&selector("link[href]")) {
        let attrs = link.value();
        let rel = attrs.attr("rel").unwrap_or("").to_ascii_lowercase();
        let href = attrs.attr("href").unwrap_or("");
        if rel.contains("stylesheet") {
            push(href, ResourceType::Stylesheet);
        } else if rel.contains("preload") && attrs.attr("as") == Some("image") {
            push(href, ResourceType::Image);
        }
    }

    for script in document.select(&selector("script")) {
        match script.value().attr("src") {
            Some(src) => push(src, ResourceType::Script),
            None => {
                let body: String = script.text().collect();
                for m in INLINE_IMAGE_URL.find_iter(&body) {
                    push(m.as_str(), ResourceType::Other);
                }
            }
        }
    }

    for style in document.select(&selector("style")) {
        let body: String = style.text().collect();
        for m in INLINE_IMAGE_URL.find_iter(&body) {
            push(m.as_str(), ResourceType::Image);
        }
    }

    requests
}

fn srcset_urls(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
}
