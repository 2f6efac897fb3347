//! Chromium-backed driver using chromiumoxide.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::{BrowserDriver, BrowserLauncher, ElementHandle, LaunchOptions, Locator};
use crate::error::{DriverError, HarvestError, HarvestResult};

/// Environment variable pointing at a Chromium/Chrome binary.
pub const CHROME_ENV: &str = "RSC_HARVEST_CHROME";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. Explicit override
    if let Ok(p) = std::env::var(CHROME_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chrome profile preferences pinning downloads to `download_dir`.
fn preferences(download_dir: &Path, open_pdf_externally: bool) -> serde_json::Value {
    serde_json::json!({
        "download": {
            "default_directory": download_dir.display().to_string(),
            "directory_upgrade": true,
            "prompt_for_download": false,
        },
        "plugins": {
            "always_open_pdf_externally": open_pdf_externally,
        },
    })
}

/// Create a throwaway profile directory holding `Default/Preferences`.
fn write_profile(download_dir: &Path, open_pdf_externally: bool) -> HarvestResult<PathBuf> {
    let profile = std::env::temp_dir().join(format!("rsc-harvest-{}", uuid::Uuid::new_v4()));
    let default_dir = profile.join("Default");
    std::fs::create_dir_all(&default_dir).map_err(|e| HarvestError::fs(&default_dir, e))?;

    let prefs_path = default_dir.join("Preferences");
    let prefs = serde_json::to_vec_pretty(&preferences(download_dir, open_pdf_externally))
        .map_err(|e| HarvestError::Session(format!("failed to encode preferences: {e}")))?;
    std::fs::write(&prefs_path, prefs).map_err(|e| HarvestError::fs(&prefs_path, e))?;
    Ok(profile)
}

/// Launches a local Chromium per session.
#[derive(Debug, Default, Clone)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> HarvestResult<Box<dyn BrowserDriver>> {
        let chrome_path = options
            .chrome_executable
            .clone()
            .or_else(find_chromium)
            .ok_or_else(|| {
                HarvestError::Session(format!(
                    "Chromium not found. Install Chrome or set {CHROME_ENV}."
                ))
            })?;

        // Chrome only honours absolute download paths.
        let download_dir = options
            .download_dir
            .canonicalize()
            .map_err(|e| HarvestError::fs(&options.download_dir, e))?;
        let profile_dir = write_profile(&download_dir, options.open_pdf_externally)?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(&profile_dir)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        builder = if options.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| HarvestError::Session(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HarvestError::Session(format!("failed to launch Chromium: {e}")))?;

        // Spawn the handler task
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let mut download = SetDownloadBehaviorParams::new(SetDownloadBehaviorBehavior::Allow);
        download.download_path = Some(download_dir.display().to_string());
        browser
            .execute(download)
            .await
            .map_err(|e| HarvestError::Session(format!("failed to set download behaviour: {e}")))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| HarvestError::Session(format!("failed to create new page: {e}")))?;

        tracing::info!(
            "Chromium started (headless: {}, downloads: {})",
            options.headless,
            download_dir.display()
        );

        Ok(Box::new(ChromiumDriver {
            browser,
            page,
            handler_task,
            profile_dir,
            navigation_timeout: options.navigation_timeout,
            elements: HashMap::new(),
            next_id: 0,
        }))
    }
}

/// A live Chromium tab plus the element handles resolved on it.
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    profile_dir: PathBuf,
    navigation_timeout: Duration,
    elements: HashMap<u64, Element>,
    next_id: u64,
}

impl ChromiumDriver {
    fn element(&self, handle: ElementHandle) -> Result<&Element, DriverError> {
        self.elements
            .get(&handle.id())
            .ok_or(DriverError::StaleHandle(handle.id()))
    }

    fn register(&mut self, element: Element) -> ElementHandle {
        self.next_id += 1;
        self.elements.insert(self.next_id, element);
        ElementHandle::new(self.next_id)
    }

    async fn query(
        &self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> Result<Vec<Element>, DriverError> {
        let result = match scope {
            Some(handle) => self.element(handle)?.find_elements(selector).await,
            None => self.page.find_elements(selector).await,
        };
        query_outcome(selector, result)
    }
}

/// `querySelectorAll` reports no match as an empty list, so any error is a
/// browser failure and must not read as "not found".
fn query_outcome<T, E: std::fmt::Display>(
    selector: &str,
    result: Result<Vec<T>, E>,
) -> Result<Vec<T>, DriverError> {
    result.map_err(|e| DriverError::Browser(format!("query `{selector}` failed: {e}")))
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        let result = tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await;
        self.elements.clear();

        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => Err(DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(DriverError::Navigation {
                url: url.to_string(),
                reason: format!("timed out after {:?}", self.navigation_timeout),
            }),
        }
    }

    async fn find(
        &mut self,
        scope: Option<ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let matches = match locator {
            Locator::Css(selector) => self.query(scope, selector).await?,
            Locator::LinkText(fragment) => {
                let mut anchors = Vec::new();
                for anchor in self.query(scope, "a").await? {
                    let text = anchor
                        .inner_text()
                        .await
                        .map_err(|e| DriverError::Browser(format!("reading link text: {e}")))?
                        .unwrap_or_default();
                    if text.contains(fragment.as_str()) {
                        anchors.push(anchor);
                    }
                }
                anchors
            }
        };
        Ok(matches.into_iter().map(|e| self.register(e)).collect())
    }

    async fn click(&mut self, element: ElementHandle) -> Result<(), DriverError> {
        self.element(element)?
            .click()
            .await
            .map_err(|e| DriverError::Browser(format!("click failed: {e}")))?;
        Ok(())
    }

    async fn type_text(&mut self, element: ElementHandle, text: &str) -> Result<(), DriverError> {
        let el = self.element(element)?;
        el.click()
            .await
            .map_err(|e| DriverError::Browser(format!("focus failed: {e}")))?;
        el.type_str(text)
            .await
            .map_err(|e| DriverError::Browser(format!("typing failed: {e}")))?;
        Ok(())
    }

    async fn attribute(
        &mut self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        self.element(element)?
            .attribute(name)
            .await
            .map_err(|e| DriverError::Browser(format!("attribute '{name}' failed: {e}")))
    }

    async fn text(&mut self, element: ElementHandle) -> Result<String, DriverError> {
        let text = self
            .element(element)?
            .inner_text()
            .await
            .map_err(|e| DriverError::Browser(format!("inner text failed: {e}")))?;
        Ok(text.unwrap_or_default())
    }

    async fn screenshot(&mut self, element: ElementHandle) -> Result<Vec<u8>, DriverError> {
        self.element(element)?
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(|e| DriverError::Browser(format!("element screenshot failed: {e}")))
    }

    async fn page_source(&mut self) -> Result<String, DriverError> {
        self.page
            .content()
            .await
            .map_err(|e| DriverError::Browser(format!("failed to get HTML: {e}")))
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        let mut this = *self;
        this.elements.clear();
        let _ = this.page.close().await;
        let closed = this.browser.close().await;
        let _ = this.browser.wait().await;
        this.handler_task.abort();

        if let Err(e) = std::fs::remove_dir_all(&this.profile_dir) {
            tracing::debug!("Could not remove profile {}: {e}", this.profile_dir.display());
        }

        closed
            .map(|_| ())
            .map_err(|e| DriverError::Browser(format!("failed to close Chromium: {e}")))
    }
}
