//! Per-article output directory tree.
//!
//! Layout under `{root}/{key}/`:
//!
//! ```text
//! raw.html            full-text page markup
//! fig_captions.csv    "fig. N\t caption" per figure
//! figs/figN.png       one snapshot per figure
//! paragraphs/         paragraphs selected by downstream analysis
//! ```
//!
//! Supplementary files land directly in `{root}/{key}/` through the
//! browser's download directory.

use std::path::{Path, PathBuf};

use crate::error::{HarvestError, HarvestResult};
use crate::types::ImageRecords;

pub const RAW_TEXT_FILE: &str = "raw.html";
pub const CAPTION_INDEX_FILE: &str = "fig_captions.csv";
pub const FIGURES_DIR: &str = "figs";
pub const PARAGRAPHS_DIR: &str = "paragraphs";

/// Writes harvested artifacts beneath a fixed root directory.
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
}

impl OutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create `{root}/{key}/figs/` and `{root}/{key}/paragraphs/`.
    ///
    /// Existing directories are accepted as-is.
    pub fn prepare_directories(&self, key: &str) -> HarvestResult<PathBuf> {
        let base = self.root.join(key);
        for dir in [base.join(FIGURES_DIR), base.join(PARAGRAPHS_DIR)] {
            std::fs::create_dir_all(&dir).map_err(|e| HarvestError::fs(&dir, e))?;
        }
        tracing::debug!("Prepared output directories at {}", base.display());
        Ok(base)
    }

    /// Write the article markup to `raw.html`.
    pub fn write_text(&self, base: &Path, content: &str) -> HarvestResult<PathBuf> {
        let path = base.join(RAW_TEXT_FILE);
        write_atomic(&path, content.as_bytes())?;
        tracing::info!("Wrote article text ({} bytes) to {}", content.len(), path.display());
        Ok(path)
    }

    /// Write the caption index to `fig_captions.csv`.
    pub fn write_caption_index(&self, base: &Path, records: &ImageRecords) -> HarvestResult<PathBuf> {
        let path = base.join(CAPTION_INDEX_FILE);
        write_atomic(&path, records.caption_index().as_bytes())?;
        Ok(path)
    }

    /// Write one `figs/fig{N}.png` per record, in ordinal order.
    pub fn write_images(&self, base: &Path, records: &ImageRecords) -> HarvestResult<Vec<PathBuf>> {
        let dir = base.join(FIGURES_DIR);
        let mut written = Vec::with_capacity(records.len());
        for record in records.iter() {
            let path = dir.join(record.file_name());
            write_atomic(&path, &record.payload)?;
            written.push(path);
        }
        tracing::info!("Wrote {} figure(s) to {}", written.len(), dir.display());
        Ok(written)
    }

    /// Write each selected paragraph to `paragraphs/{key}.{index}.txt`.
    pub fn write_paragraphs(
        &self,
        base: &Path,
        key: &str,
        selected: &[(usize, &str)],
    ) -> HarvestResult<Vec<PathBuf>> {
        let dir = base.join(PARAGRAPHS_DIR);
        let mut written = Vec::with_capacity(selected.len());
        for (index, text) in selected {
            let path = dir.join(format!("{key}.{index}.txt"));
            write_atomic(&path, text.as_bytes())?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Write through a sibling temp file so readers never see a torn file.
fn write_atomic(path: &Path, bytes: &[u8]) -> HarvestResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    std::fs::write(&tmp, bytes).map_err(|e| HarvestError::fs(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| HarvestError::fs(path, e))?;
    Ok(())
}
