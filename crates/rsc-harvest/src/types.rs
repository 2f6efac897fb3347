//! Core data types shared across the pipeline.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::HarvestWarning;

/// Caption written for figures that carry no caption element.
pub const NO_CAPTION: &str = "none";

/// Collapse every whitespace run (newlines and tabs included) to one space.
pub(crate) fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Portal sign-in credentials.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One captured figure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// 1-based position in document order.
    pub ordinal: u32,
    pub source: Option<String>,
    /// PNG snapshot of the rendered image region.
    pub payload: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub caption: Option<String>,
}

impl ImageRecord {
    /// Caption text, or [`NO_CAPTION`] when the figure had none.
    pub fn caption_text(&self) -> &str {
        self.caption.as_deref().unwrap_or(NO_CAPTION)
    }

    /// File name under `figs/`.
    pub fn file_name(&self) -> String {
        format!("fig{}.png", self.ordinal)
    }
}

/// Ordered association of ordinal to figure, created fresh for every article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRecords {
    records: BTreeMap<u32, ImageRecord>,
}

impl ImageRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any earlier capture of the same ordinal.
    pub fn upsert(&mut self, record: ImageRecord) {
        self.records.insert(record.ordinal, record);
    }

    pub fn get(&self, ordinal: u32) -> Option<&ImageRecord> {
        self.records.get(&ordinal)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = &ImageRecord> {
        self.records.values()
    }

    /// Tab-separated caption index, exactly one `fig. N\t caption` line per
    /// ordinal. Captions are flattened onto a single line.
    pub fn caption_index(&self) -> String {
        self.iter()
            .map(|r| {
                let flat = single_line(r.caption_text());
                let caption = if flat.is_empty() { NO_CAPTION } else { flat.as_str() };
                format!("fig. {}\t {}", r.ordinal, caption)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct OutputBundle {
    pub identifier: String,
    pub base_path: PathBuf,
    pub raw_text_path: PathBuf,
    pub caption_index_path: PathBuf,
    pub figure_paths: Vec<PathBuf>,
    /// Labels of the supplementary links whose download was triggered.
    pub supplementary: Vec<String>,
    pub paragraph_paths: Vec<PathBuf>,
    pub warnings: Vec<HarvestWarning>,
}

impl OutputBundle {
    /// True when a degraded step left the bundle incomplete.
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}
