// src/services/browser.rs

//! Headless Chromium renderer.
//!
//! Every session launches its own browser. A page is opened, a listener for
//! `Network.requestWillBeSent` is attached before navigation, and after the
//! load finishes the listener keeps recording for the settle window so that
//! script-driven image loads are observed too. Closing the session closes the
//! browser and stops its event loop.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventRequestWillBeSent, ResourceType as CdpResourceType,
};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{ObservedRequest, RenderConfig, ResourceType, Target};
use crate::services::render::{PageRenderer, RenderSession};

/// Renderer backed by a headless Chromium process per session.
#[derive(Debug, Clone)]
pub struct ChromiumPageRenderer {
    executable: Option<PathBuf>,
    user_agent: String,
    settle: Duration,
}

impl ChromiumPageRenderer {
    pub fn new(config: &RenderConfig, user_agent: &str) -> Self {
        Self {
            executable: config.chromium_path.clone(),
            user_agent: user_agent.to_string(),
            settle: config.settle(),
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg(format!("--user-agent={}", self.user_agent))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder
            .build()
            .map_err(|e| AppError::config(format!("invalid browser config: {}", e)))
    }
}

#[async_trait]
impl PageRenderer for ChromiumPageRenderer {
    async fn open(&self) -> Result<Box<dyn RenderSession>> {
        let config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| browser_error("launch failed", e))?;

        // The handler drives the CDP connection; nothing works unless it is polled.
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Browser event loop stopped: {}", e);
                    break;
                }
            }
        });

        log::debug!("Browser launched");
        Ok(Box::new(ChromiumSession {
            browser,
            events,
            settle: self.settle,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    events: JoinHandle<()>,
    settle: Duration,
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn collect(&mut self, target: &Target) -> Result<Vec<ObservedRequest>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::render(&target.locator, e))?;
        let mut sent = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| AppError::render(&target.locator, e))?;

        page.goto(target.locator.as_str())
            .await
            .map_err(|e| AppError::render(&target.locator, e))?;

        let mut requests = Vec::new();
        let settle_until = Instant::now() + self.settle;
        while let Ok(Some(event)) = tokio::time::timeout_at(settle_until, sent.next()).await {
            requests.push(ObservedRequest::new(
                event.request.url.clone(),
                resource_type(event.r#type.as_ref()),
            ));
        }

        log::debug!(
            "Observed {} requests on {}",
            requests.len(),
            target.locator
        );
        Ok(requests)
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            log::debug!("Waiting for browser exit failed: {}", e);
        }
        self.events.abort();
        closed
            .map(|_| ())
            .map_err(|e| browser_error("close failed", e))
    }
}

fn browser_error(context: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Io(std::io::Error::other(format!("browser {}: {}", context, e)))
}

/// Map a CDP resource type onto the kinds the acceptance filter knows.
fn resource_type(kind: Option<&CdpResourceType>) -> ResourceType {
    match kind {
        Some(CdpResourceType::Document) => ResourceType::Document,
        Some(CdpResourceType::Image) => ResourceType::Image,
        Some(CdpResourceType::Script) => ResourceType::Script,
        Some(CdpResourceType::Stylesheet) => ResourceType::Stylesheet,
        _ => ResourceType::Other,
    }
}
