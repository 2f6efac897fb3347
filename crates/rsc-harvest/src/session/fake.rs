//! Scripted in-memory browser for tests.
//!
//! A [`FakeSite`] maps URLs to flat node trees. Nodes answer to the exact
//! [`Locator`] they were built with (or, for anchors, to a link-text
//! fragment), so tests can drive the pipeline with the production selectors
//! and no real browser.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{BrowserDriver, BrowserLauncher, ElementHandle, LaunchOptions, Locator};
use crate::error::{DriverError, HarvestError, HarvestResult};
use crate::types::Credentials;

#[derive(Debug, Clone)]
pub(crate) enum ClickAction {
    Navigate(String),
    /// Check the typed credentials, then navigate to `next`.
    SubmitLogin { next: String },
    Download { file_name: String },
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum FieldRole {
    Username,
    Password,
}

#[derive(Debug, Clone)]
enum Snapshot {
    Png { width: u32, height: u32 },
    Garbage,
    /// The browser refuses to capture the element.
    Refused,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeNode {
    locator: Option<Locator>,
    link_text: Option<String>,
    text: String,
    attributes: HashMap<String, String>,
    on_click: Option<ClickAction>,
    field: Option<FieldRole>,
    appears_after: Option<Duration>,
    snapshot: Snapshot,
}

impl FakeNode {
    fn blank() -> Self {
        Self {
            locator: None,
            link_text: None,
            text: String::new(),
            attributes: HashMap::new(),
            on_click: None,
            field: None,
            appears_after: None,
            snapshot: Snapshot::Png {
                width: 4,
                height: 3,
            },
        }
    }

    pub(crate) fn matching(locator: Locator) -> Self {
        Self {
            locator: Some(locator),
            ..Self::blank()
        }
    }

    /// An anchor found by link text.
    pub(crate) fn link(text: &str) -> Self {
        Self {
            link_text: Some(text.to_string()),
            text: text.to_string(),
            ..Self::blank()
        }
    }

    pub(crate) fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub(crate) fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub(crate) fn on_click(mut self, action: ClickAction) -> Self {
        self.on_click = Some(action);
        self
    }

    pub(crate) fn field(mut self, role: FieldRole) -> Self {
        self.field = Some(role);
        self
    }

    /// Invisible until `delay` after the first lookup that could match it.
    pub(crate) fn appears_after(mut self, delay: Duration) -> Self {
        self.appears_after = Some(delay);
        self
    }

    pub(crate) fn snapshot_size(mut self, width: u32, height: u32) -> Self {
        self.snapshot = Snapshot::Png { width, height };
        self
    }

    pub(crate) fn garbage_snapshot(mut self) -> Self {
        self.snapshot = Snapshot::Garbage;
        self
    }

    /// Located, but every screenshot fails the way Chromium does for an
    /// element that has not been laid out yet.
    pub(crate) fn invisible(mut self) -> Self {
        self.snapshot = Snapshot::Refused;
        self
    }

    fn answers_to(&self, locator: &Locator) -> bool {
        if self.locator.as_ref() == Some(locator) {
            return true;
        }
        match (locator, &self.link_text) {
            (Locator::LinkText(fragment), Some(text)) => text.contains(fragment.as_str()),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FakePage {
    source: String,
    nodes: Vec<(Option<usize>, FakeNode)>,
}

impl FakePage {
    pub(crate) fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            nodes: Vec::new(),
        }
    }

    /// Append a node under `parent`; returns its index for nesting.
    pub(crate) fn add(&mut self, parent: Option<usize>, node: FakeNode) -> usize {
        self.nodes.push((parent, node));
        self.nodes.len() - 1
    }

    fn is_descendant(&self, node: usize, ancestor: usize) -> bool {
        let mut cursor = self.nodes[node].0;
        while let Some(parent) = cursor {
            if parent == ancestor {
                return true;
            }
            cursor = self.nodes[parent].0;
        }
        false
    }
}

/// URL → page, with optional variants served once signed in.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeSite {
    public: HashMap<String, FakePage>,
    member: HashMap<String, FakePage>,
    credentials: Option<Credentials>,
    visit_limits: HashMap<String, usize>,
}

impl FakeSite {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, url: &str, page: FakePage) -> Self {
        self.public.insert(url.to_string(), page);
        self
    }

    pub(crate) fn member_page(mut self, url: &str, page: FakePage) -> Self {
        self.member.insert(url.to_string(), page);
        self
    }

    pub(crate) fn accepts(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Fail navigation to `url` once it has been loaded `visits` times.
    pub(crate) fn gone_after(mut self, url: &str, visits: usize) -> Self {
        self.visit_limits.insert(url.to_string(), visits);
        self
    }
}

/// Everything the fake browser observed.
#[derive(Debug, Default)]
pub(crate) struct FakeLog {
    pub launches: Vec<LaunchOptions>,
    pub visits: Vec<String>,
    pub downloads: Vec<PathBuf>,
    pub closed: usize,
}

pub(crate) struct FakeDriver {
    site: FakeSite,
    current: Option<String>,
    logged_in: bool,
    typed: HashMap<FieldRole, String>,
    handles: HashMap<u64, usize>,
    next_handle: u64,
    first_seen: HashMap<(String, usize), Instant>,
    download_dir: PathBuf,
    log: Arc<Mutex<FakeLog>>,
}

impl FakeDriver {
    pub(crate) fn new(site: FakeSite, download_dir: PathBuf) -> Self {
        Self::with_log(site, download_dir, Arc::default())
    }

    fn with_log(site: FakeSite, download_dir: PathBuf, log: Arc<Mutex<FakeLog>>) -> Self {
        Self {
            site,
            current: None,
            logged_in: false,
            typed: HashMap::new(),
            handles: HashMap::new(),
            next_handle: 0,
            first_seen: HashMap::new(),
            download_dir,
            log,
        }
    }

    /// Position the driver without recording a visit.
    pub(crate) fn start_at(&mut self, url: &str) {
        self.current = Some(url.to_string());
    }

    fn page(&self) -> Result<(&str, &FakePage), DriverError> {
        let url = self
            .current
            .as_deref()
            .ok_or_else(|| DriverError::Browser("no page loaded".into()))?;
        let page = self
            .logged_in
            .then(|| self.site.member.get(url))
            .flatten()
            .or_else(|| self.site.public.get(url))
            .ok_or_else(|| DriverError::Browser(format!("no page for {url}")))?;
        Ok((url, page))
    }

    fn node(&self, element: ElementHandle) -> Result<&FakeNode, DriverError> {
        let index = *self
            .handles
            .get(&element.id())
            .ok_or(DriverError::StaleHandle(element.id()))?;
        let (_, page) = self.page()?;
        Ok(&page.nodes[index].1)
    }

    fn load(&mut self, url: &str) -> Result<(), DriverError> {
        let known = self.site.public.contains_key(url) || self.site.member.contains_key(url);
        if !known {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "404".into(),
            });
        }
        let mut log = self.log.lock().unwrap();
        if let Some(&limit) = self.site.visit_limits.get(url) {
            if log.visits.iter().filter(|v| v.as_str() == url).count() >= limit {
                return Err(DriverError::Navigation {
                    url: url.to_string(),
                    reason: "connection reset".into(),
                });
            }
        }
        log.visits.push(url.to_string());
        drop(log);

        self.current = Some(url.to_string());
        self.handles.clear();
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        self.load(url)
    }

    async fn find(
        &mut self,
        scope: Option<ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let scope_index = match scope {
            Some(handle) => Some(
                *self
                    .handles
                    .get(&handle.id())
                    .ok_or(DriverError::StaleHandle(handle.id()))?,
            ),
            None => None,
        };

        let now = Instant::now();
        let (url, page) = self.page()?;
        let url = url.to_string();
        let mut candidates = Vec::new();
        for (index, (_, node)) in page.nodes.iter().enumerate() {
            if !node.answers_to(locator) {
                continue;
            }
            if let Some(ancestor) = scope_index {
                if !page.is_descendant(index, ancestor) {
                    continue;
                }
            }
            candidates.push((index, node.appears_after));
        }

        let mut found = Vec::new();
        for (index, appears_after) in candidates {
            if let Some(delay) = appears_after {
                let seen = *self.first_seen.entry((url.clone(), index)).or_insert(now);
                if now.duration_since(seen) < delay {
                    continue;
                }
            }
            self.next_handle += 1;
            self.handles.insert(self.next_handle, index);
            found.push(ElementHandle::new(self.next_handle));
        }
        Ok(found)
    }

    async fn click(&mut self, element: ElementHandle) -> Result<(), DriverError> {
        let action = self.node(element)?.on_click.clone();
        match action {
            None => Ok(()),
            Some(ClickAction::Navigate(url)) => self.load(&url),
            Some(ClickAction::SubmitLogin { next }) => {
                if let Some(expected) = &self.site.credentials {
                    self.logged_in = self.typed.get(&FieldRole::Username) == Some(&expected.username)
                        && self.typed.get(&FieldRole::Password) == Some(&expected.password);
                }
                self.load(&next)
            }
            Some(ClickAction::Download { file_name }) => {
                let path = self.download_dir.join(file_name);
                std::fs::write(&path, b"%PDF-1.4 fake")
                    .map_err(|e| DriverError::Browser(e.to_string()))?;
                self.log.lock().unwrap().downloads.push(path);
                Ok(())
            }
            Some(ClickAction::Fail) => Err(DriverError::Browser("click intercepted".into())),
        }
    }

    async fn type_text(&mut self, element: ElementHandle, text: &str) -> Result<(), DriverError> {
        if let Some(role) = self.node(element)?.field {
            self.typed.insert(role, text.to_string());
        }
        Ok(())
    }

    async fn attribute(
        &mut self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        Ok(self.node(element)?.attributes.get(name).cloned())
    }

    async fn text(&mut self, element: ElementHandle) -> Result<String, DriverError> {
        Ok(self.node(element)?.text.clone())
    }

    async fn screenshot(&mut self, element: ElementHandle) -> Result<Vec<u8>, DriverError> {
        match self.node(element)?.snapshot {
            Snapshot::Png { width, height } => Ok(png(width, height)),
            Snapshot::Garbage => Ok(b"not an image".to_vec()),
            Snapshot::Refused => Err(DriverError::Browser(
                "element screenshot failed: Node is either not visible or not an HTMLElement"
                    .into(),
            )),
        }
    }

    async fn page_source(&mut self) -> Result<String, DriverError> {
        Ok(self.page()?.1.source.clone())
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.log.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// Solid-colour PNG of the given size.
pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::new_rgb8(width, height);
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    img.write_with_encoder(encoder).unwrap();
    buf
}

/// Launches [`FakeDriver`]s over a copy of one site, sharing a log.
pub(crate) struct FakeLauncher {
    site: FakeSite,
    pub log: Arc<Mutex<FakeLog>>,
    fail: bool,
}

impl FakeLauncher {
    pub(crate) fn new(site: FakeSite) -> Self {
        Self {
            site,
            log: Arc::default(),
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(FakeSite::new())
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, options: &LaunchOptions) -> HarvestResult<Box<dyn BrowserDriver>> {
        if self.fail {
            return Err(HarvestError::Session("browser binary missing".into()));
        }
        self.log.lock().unwrap().launches.push(options.clone());
        Ok(Box::new(FakeDriver::with_log(
            self.site.clone(),
            options.download_dir.clone(),
            Arc::clone(&self.log),
        )))
    }
}
