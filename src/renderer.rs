//! Headless browser rendering
//!
//! The orchestrator only sees the [`Renderer`] and [`RendererLauncher`]
//! traits. [`ChromeLauncher`] is the production backend: one headless
//! Chromium process per request, bound to the port handed to `launch`.

use crate::{Config, PreviewError, Viewport};
use anyhow::Context;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of opening a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Success,
    Fail,
}

/// A single launched renderer instance
#[async_trait]
pub trait Renderer: Send {
    /// Load `url` in a viewport of the given size.
    async fn open(&mut self, url: &str, viewport: &Viewport) -> Result<PageStatus, PreviewError>;

    /// Rasterize the opened page to a PNG at `path`.
    async fn render_to_file(&mut self, path: &Path) -> Result<(), PreviewError>;

    /// Release the instance. Must be safe to call after any failure.
    async fn close(&mut self);
}

/// Starts renderer instances bound to a given port
#[async_trait]
pub trait RendererLauncher: Send + Sync {
    async fn launch(&self, port: u16) -> Result<Box<dyn Renderer>, PreviewError>;
}

/// Launches headless Chromium through the DevTools protocol
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    config: Config,
}

impl ChromeLauncher {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn browser_config(&self, port: u16) -> anyhow::Result<BrowserConfig> {
        let user_data_dir = user_data_dir_for(port);
        std::fs::create_dir_all(&user_data_dir)
            .with_context(|| format!("creating {}", user_data_dir.display()))?;

        let viewport = self.config.default_viewport;
        let mut builder = BrowserConfig::builder()
            .window_size(viewport.width, viewport.height)
            .port(port)
            .user_data_dir(&user_data_dir)
            .args(chrome_args(&self.config));

        if let Some(chrome_path) = &self.config.chrome_path {
            builder = builder.chrome_executable(chrome_path);
        }

        builder
            .build()
            .map_err(|e| anyhow::anyhow!(e))
            .context("invalid browser configuration")
    }
}

#[async_trait]
impl RendererLauncher for ChromeLauncher {
    async fn launch(&self, port: u16) -> Result<Box<dyn Renderer>, PreviewError> {
        let browser_config = self
            .browser_config(port)
            .map_err(|e| PreviewError::RenderFailure(format!("{e:#}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| PreviewError::RenderFailure(format!("browser launch failed: {e}")))?;

        // The handler stream carries all DevTools traffic and must be polled
        // for the browser to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Handler error: {}", e);
                }
            }
        });

        info!("Renderer launched on port {}", port);
        Ok(Box::new(ChromeRenderer {
            browser,
            handler: handler_task,
            page: None,
            port,
        }))
    }
}

struct ChromeRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
    port: u16,
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn open(&mut self, url: &str, viewport: &Viewport) -> Result<PageStatus, PreviewError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| PreviewError::RenderFailure(format!("cannot create page: {e}")))?;

        let emulation_params = SetDeviceMetricsOverrideParams::builder()
            .width(viewport.width)
            .height(viewport.height)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| PreviewError::RenderFailure(e.to_string()))?;

        page.execute(emulation_params)
            .await
            .map_err(|e| PreviewError::RenderFailure(e.to_string()))?;

        let status = match page.goto(url).await {
            Ok(_) => PageStatus::Success,
            Err(e) => {
                warn!("Failed to open {}: {}", url, e);
                PageStatus::Fail
            }
        };

        self.page = Some(page);
        Ok(status)
    }

    async fn render_to_file(&mut self, path: &Path) -> Result<(), PreviewError> {
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| PreviewError::RenderFailure("no page has been opened".to_string()))?;

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();

        page.save_screenshot(params, path)
            .await
            .map_err(|e| PreviewError::RenderFailure(format!("screenshot failed: {e}")))?;

        Ok(())
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Page on port {} did not close: {}", self.port, e);
            }
        }

        if let Err(e) = self.browser.close().await {
            warn!("Renderer on port {} did not close cleanly: {}", self.port, e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Renderer process on port {} was not reaped: {}", self.port, e);
        }
        self.handler.abort();

        let user_data_dir = user_data_dir_for(self.port);
        if let Err(e) = tokio::fs::remove_dir_all(&user_data_dir).await {
            debug!(
                "Could not remove user data dir {}: {}",
                user_data_dir.display(),
                e
            );
        }
        debug!("Renderer on port {} closed", self.port);
    }
}

fn user_data_dir_for(port: u16) -> PathBuf {
    std::env::temp_dir().join(format!("page-preview-{}-{}", std::process::id(), port))
}

/// Chrome command-line arguments for a headless, isolated render
pub fn chrome_args(config: &Config) -> Vec<String> {
    let mut args = vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--hide-scrollbars".to_string(),
        "--disable-features=ProcessSingleton".to_string(),
    ];

    if let Some(user_agent) = &config.user_agent {
        args.push(format!("--user-agent={user_agent}"));
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_args_generation() {
        let args = chrome_args(&Config::default());
        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--user-agent")));
    }

    #[test]
    fn test_chrome_args_user_agent() {
        let config = Config {
            user_agent: Some("PreviewBot/1.0".to_string()),
            ..Default::default()
        };
        assert!(chrome_args(&config).contains(&"--user-agent=PreviewBot/1.0".to_string()));
    }

    #[test]
    fn test_user_data_dir_is_per_port() {
        assert_ne!(user_data_dir_for(9001), user_data_dir_for(9002));
    }
}
