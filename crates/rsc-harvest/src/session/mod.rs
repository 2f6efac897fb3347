//! Browser session abstraction.
//!
//! [`BrowserDriver`] is the capability seam over a real browser: every call
//! is a single attempt with no waiting. [`Session`] wraps one driver for the
//! lifetime of a run and adds the implicit wait applied to every locate call.

pub mod chromium;
#[cfg(test)]
pub(crate) mod fake;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Delays;
use crate::error::{DriverError, HarvestError, HarvestResult};
use crate::wait::{self, Deadline};

/// How to find an element on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// CSS selector.
    Css(String),
    /// Anchor whose visible text contains this fragment.
    LinkText(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn link_text(text: impl Into<String>) -> Self {
        Self::LinkText(text.into())
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css(selector) => write!(f, "css `{selector}`"),
            Self::LinkText(text) => write!(f, "link text \"{text}\""),
        }
    }
}

/// Opaque reference to an element found by a driver.
///
/// Handles become stale when the page navigates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(u64);

impl ElementHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Options applied before the first navigation.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Where triggered downloads are saved.
    pub download_dir: PathBuf,
    /// Save PDFs to disk instead of rendering them in the tab.
    pub open_pdf_externally: bool,
    pub chrome_executable: Option<PathBuf>,
    pub navigation_timeout: Duration,
}

/// Single-attempt browser primitives.
#[async_trait]
pub trait BrowserDriver: Send {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError>;
    /// All current matches, in document order. Empty when nothing matches.
    async fn find(
        &mut self,
        scope: Option<ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError>;
    async fn click(&mut self, element: ElementHandle) -> Result<(), DriverError>;
    async fn type_text(&mut self, element: ElementHandle, text: &str) -> Result<(), DriverError>;
    async fn attribute(
        &mut self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError>;
    /// Rendered text of the element.
    async fn text(&mut self, element: ElementHandle) -> Result<String, DriverError>;
    /// PNG snapshot of just the element's region.
    async fn screenshot(&mut self, element: ElementHandle) -> Result<Vec<u8>, DriverError>;
    /// Full markup of the current page.
    async fn page_source(&mut self) -> Result<String, DriverError>;
    async fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// Starts configured browser drivers.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> HarvestResult<Box<dyn BrowserDriver>>;
}

/// The one interactive session owned by a harvest run.
pub struct Session {
    driver: Option<Box<dyn BrowserDriver>>,
    implicit_wait: Duration,
    poll_interval: Duration,
}

impl Session {
    pub fn new(driver: Box<dyn BrowserDriver>, delays: &Delays) -> Self {
        Self {
            driver: Some(driver),
            implicit_wait: delays.implicit_wait(),
            poll_interval: delays.poll_interval(),
        }
    }

    fn driver(&mut self) -> HarvestResult<&mut Box<dyn BrowserDriver>> {
        self.driver
            .as_mut()
            .ok_or_else(|| HarvestError::Session("session already closed".into()))
    }

    pub async fn navigate(&mut self, url: &str) -> HarvestResult<()> {
        tracing::debug!("Navigating to {url}");
        self.driver()?.goto(url).await?;
        Ok(())
    }

    /// Poll until at least one match exists or the implicit wait runs out.
    async fn poll_find(
        &mut self,
        scope: Option<ElementHandle>,
        locator: &Locator,
    ) -> HarvestResult<Vec<ElementHandle>> {
        let deadline = Deadline::after(self.implicit_wait);
        let interval = self.poll_interval;
        loop {
            let found = self.driver()?.find(scope, locator).await?;
            if !found.is_empty() {
                return Ok(found);
            }
            if !deadline.tick(interval).await {
                tracing::trace!("No match for {locator} after {:?}", self.implicit_wait);
                return Ok(found);
            }
        }
    }

    /// First element matching `locator`.
    pub async fn locate(&mut self, locator: &Locator) -> HarvestResult<ElementHandle> {
        self.poll_find(None, locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| HarvestError::ElementNotFound(locator.to_string()))
    }

    /// First descendant of `scope` matching `locator`.
    pub async fn locate_within(
        &mut self,
        scope: ElementHandle,
        locator: &Locator,
    ) -> HarvestResult<ElementHandle> {
        self.poll_find(Some(scope), locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| HarvestError::ElementNotFound(format!("{locator} inside #{}", scope.id())))
    }

    /// Every element matching `locator`; empty once the implicit wait expires.
    pub async fn locate_all(&mut self, locator: &Locator) -> HarvestResult<Vec<ElementHandle>> {
        self.poll_find(None, locator).await
    }

    pub async fn locate_all_within(
        &mut self,
        scope: ElementHandle,
        locator: &Locator,
    ) -> HarvestResult<Vec<ElementHandle>> {
        self.poll_find(Some(scope), locator).await
    }

    pub async fn click(&mut self, element: ElementHandle) -> HarvestResult<()> {
        self.driver()?.click(element).await?;
        Ok(())
    }

    pub async fn type_text(&mut self, element: ElementHandle, text: &str) -> HarvestResult<()> {
        self.driver()?.type_text(element, text).await?;
        Ok(())
    }

    pub async fn attribute(
        &mut self,
        element: ElementHandle,
        name: &str,
    ) -> HarvestResult<Option<String>> {
        Ok(self.driver()?.attribute(element, name).await?)
    }

    pub async fn text(&mut self, element: ElementHandle) -> HarvestResult<String> {
        Ok(self.driver()?.text(element).await?)
    }

    pub async fn screenshot(&mut self, element: ElementHandle) -> HarvestResult<Vec<u8>> {
        Ok(self.driver()?.screenshot(element).await?)
    }

    pub async fn page_source(&mut self) -> HarvestResult<String> {
        Ok(self.driver()?.page_source().await?)
    }

    /// Fixed delay to absorb asynchronous page updates.
    pub async fn pause(&self, delay: Duration) {
        tracing::trace!("Pausing {delay:?}");
        wait::settle(delay).await;
    }

    /// Tear the browser down. Later calls are no-ops.
    pub async fn close(&mut self) -> HarvestResult<()> {
        match self.driver.take() {
            Some(driver) => {
                driver.close().await?;
                tracing::debug!("Browser session closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.driver.is_some()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.driver.is_some() {
            tracing::warn!("Browser session dropped without close()");
        }
    }
}
