//! rsc-harvest: acquisition and extraction pipeline for Royal Society of
//! Chemistry journal articles.
//!
//! A single browser session is driven through conditional sign-in, then the
//! article's full-text markup, figure snapshots with captions, and
//! supplementary attachments are collected into a per-article directory.

pub mod analysis;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod identifier;
pub mod pipeline;
pub mod session;
pub mod store;
pub mod types;
pub mod wait;

pub use analysis::{ParagraphCounts, SelectionThresholds, TextAnalyzer};
pub use auth::AuthState;
pub use config::{Delays, HarvestConfig, PortalConfig, Selectors};
pub use error::{DriverError, HarvestError, HarvestResult, HarvestWarning};
pub use identifier::{sanitize, ArticleRequest};
pub use pipeline::Harvester;
pub use session::chromium::{find_chromium, ChromiumLauncher};
pub use session::{BrowserDriver, BrowserLauncher, ElementHandle, LaunchOptions, Locator, Session};
pub use store::OutputStore;
pub use types::*;
