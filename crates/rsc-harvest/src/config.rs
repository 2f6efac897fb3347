//! Configuration loading and resolution.
//!
//! Every field has a default matching the live RSC portal, so an empty JSON
//! object (or no file at all) is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::SelectionThresholds;
use crate::error::{HarvestError, HarvestResult};
use crate::session::Locator;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "RSC_HARVEST_CONFIG";

/// Configuration file picked up from the working directory.
pub const LOCAL_CONFIG_FILE: &str = "rsc-harvest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Root under which one directory per article is created.
    pub output_root: PathBuf,
    pub headless: bool,
    /// Explicit browser binary; discovered automatically when unset.
    pub chrome_executable: Option<PathBuf>,
    pub portal: PortalConfig,
    pub delays: Delays,
    /// Literal, case-sensitive fragments that mark a supplementary link as
    /// a downloadable document.
    pub supplementary_markers: Vec<String>,
    pub paragraph_selection: SelectionThresholds,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("./rsc_harvest_output"),
            headless: true,
            chrome_executable: None,
            portal: PortalConfig::default(),
            delays: Delays::default(),
            supplementary_markers: ["PDF", "pdf", "DOCX", "docx"]
                .into_iter()
                .map(String::from)
                .collect(),
            paragraph_selection: SelectionThresholds::default(),
        }
    }
}

impl HarvestConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: &Path) -> HarvestResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| HarvestError::fs(path, e))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| HarvestError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the active configuration.
    ///
    /// Priority: explicit path, then `RSC_HARVEST_CONFIG`, then
    /// `./rsc-harvest.json`, then built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> HarvestResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&env_path));
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            tracing::debug!("Using configuration from {}", local.display());
            return Self::from_file(&local);
        }

        Ok(Self::default())
    }

    /// Reject configurations that cannot drive a run.
    pub fn validate(&self) -> HarvestResult<()> {
        if self.portal.registrant.trim().is_empty() {
            return Err(HarvestError::Config("portal.registrant is empty".into()));
        }
        if self.delays.poll_interval_ms == 0 {
            return Err(HarvestError::Config(
                "delays.poll_interval_ms must be positive".into(),
            ));
        }
        if self.supplementary_markers.iter().any(|m| m.is_empty()) {
            return Err(HarvestError::Config(
                "supplementary_markers must not contain empty strings".into(),
            ));
        }
        Ok(())
    }
}

/// Publisher-specific addressing and page structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// DOI registrant prefix accepted by this portal.
    pub registrant: String,
    /// Prefix joined with the identifier to form the article URL.
    pub resolver_base: String,
    /// Page used for the access check; the article URL when unset.
    pub probe_url: Option<String>,
    pub selectors: Selectors,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            registrant: "10.1039".to_string(),
            resolver_base: "https://doi.org/".to_string(),
            probe_url: None,
            selectors: Selectors::default(),
        }
    }
}

/// Page controls the pipeline interacts with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Present only when the viewer may read the full text.
    pub access_control: Locator,
    pub sign_in_link: Locator,
    pub username_field: Locator,
    pub password_field: Locator,
    pub login_submit: Locator,
    /// "View HTML" action that opens the full-text page.
    pub full_text_trigger: Locator,
    pub figure_container: Locator,
    pub figure_holder: Locator,
    pub figure_image: Locator,
    pub figure_caption: Locator,
    pub about_panel: Locator,
    /// Attachment links, resolved inside `about_panel`. CSS here is
    /// element-scoped, so `:scope` anchors it to the panel itself.
    pub supplementary_link: Locator,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            access_control: Locator::link_text("Article HTML"),
            sign_in_link: Locator::link_text("Sign in"),
            username_field: Locator::css("#SubscriberLoginData_UserName"),
            password_field: Locator::css("#SubscriberLoginData_Password"),
            login_submit: Locator::css(
                "#maincontent > div:nth-of-type(2) > div > div:nth-of-type(1) > \
                 section:nth-of-type(1) > div > div > form > input",
            ),
            full_text_trigger: Locator::css("#DownloadOption > div > a:nth-of-type(2)"),
            figure_container: Locator::css(".image_table"),
            figure_holder: Locator::css(".imgHolder"),
            figure_image: Locator::css("img"),
            figure_caption: Locator::css(".image_title"),
            about_panel: Locator::css("#divAbout"),
            supplementary_link: Locator::css(":scope > div:nth-of-type(2) > ul > li > a"),
        }
    }
}

/// Fixed delays and polling budgets, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Delays {
    /// Budget every locate call polls for before reporting not-found.
    pub implicit_wait_ms: u64,
    pub poll_interval_ms: u64,
    pub navigation_timeout_ms: u64,
    /// Pause after submitting the sign-in form.
    pub login_redirect_ms: u64,
    /// Extra wait before re-probing when the sign-in form was missing.
    pub login_grace_ms: u64,
    /// Pause before re-checking access after a login attempt.
    pub recheck_settle_ms: u64,
    /// Pause after opening the full-text view.
    pub render_settle_ms: u64,
    /// Pause before the single retry of figure extraction.
    pub figure_retry_ms: u64,
    /// Pause after returning to the landing page, before SI extraction.
    pub landing_settle_ms: u64,
    /// Pause after each supplementary download trigger.
    pub download_gap_ms: u64,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            implicit_wait_ms: 2_000,
            poll_interval_ms: 250,
            navigation_timeout_ms: 30_000,
            login_redirect_ms: 4_000,
            login_grace_ms: 2_000,
            recheck_settle_ms: 1_000,
            render_settle_ms: 2_000,
            figure_retry_ms: 5_000,
            landing_settle_ms: 2_000,
            download_gap_ms: 2_000,
        }
    }
}

impl Delays {
    pub fn implicit_wait(&self) -> Duration {
        Duration::from_millis(self.implicit_wait_ms)
    }
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
    pub fn login_redirect(&self) -> Duration {
        Duration::from_millis(self.login_redirect_ms)
    }
    pub fn login_grace(&self) -> Duration {
        Duration::from_millis(self.login_grace_ms)
    }
    pub fn recheck_settle(&self) -> Duration {
        Duration::from_millis(self.recheck_settle_ms)
    }
    pub fn render_settle(&self) -> Duration {
        Duration::from_millis(self.render_settle_ms)
    }
    pub fn figure_retry(&self) -> Duration {
        Duration::from_millis(self.figure_retry_ms)
    }
    pub fn landing_settle(&self) -> Duration {
        Duration::from_millis(self.landing_settle_ms)
    }
    pub fn download_gap(&self) -> Duration {
        Duration::from_millis(self.download_gap_ms)
    }
}
