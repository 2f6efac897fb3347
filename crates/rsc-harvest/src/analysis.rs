//! Paragraph hand-off to downstream text mining.
//!
//! The harvested markup is split into paragraphs, a [`TextAnalyzer`] counts
//! chemical entity mentions and physical quantities in each, and the
//! paragraphs dense in both (likely synthesis procedures) are kept. The
//! counting itself belongs to the caller's text-mining stack.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

/// Mention counts for one paragraph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParagraphCounts {
    pub chemical_mentions: usize,
    pub quantity_mentions: usize,
}

/// Counts mentions in paragraphs. Returns one entry per input paragraph.
pub trait TextAnalyzer: Send + Sync {
    fn analyze(&self, paragraphs: &[String]) -> Vec<ParagraphCounts>;
}

/// Minimum counts (inclusive) for a paragraph to be kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionThresholds {
    pub min_chemical_mentions: usize,
    pub min_quantity_mentions: usize,
}

impl Default for SelectionThresholds {
    fn default() -> Self {
        Self {
            min_chemical_mentions: 3,
            min_quantity_mentions: 3,
        }
    }
}

impl SelectionThresholds {
    pub fn accepts(&self, counts: &ParagraphCounts) -> bool {
        counts.chemical_mentions >= self.min_chemical_mentions
            && counts.quantity_mentions >= self.min_quantity_mentions
    }
}

/// Whitespace-normalized text of every non-empty `<p>` in `html`.
pub fn paragraphs_from_html(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("p") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|p| {
            p.text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.is_empty())
        .collect()
}

/// `(index, text)` of each paragraph whose counts pass `thresholds`.
pub fn select_key_paragraphs<'a>(
    paragraphs: &'a [String],
    counts: &[ParagraphCounts],
    thresholds: &SelectionThresholds,
) -> Vec<(usize, &'a str)> {
    if paragraphs.len() != counts.len() {
        tracing::warn!(
            "Analyzer returned {} count(s) for {} paragraph(s)",
            counts.len(),
            paragraphs.len()
        );
    }

    paragraphs
        .iter()
        .zip(counts)
        .enumerate()
        .filter(|(_, (_, c))| thresholds.accepts(c))
        .map(|(i, (text, _))| (i, text.as_str()))
        .collect()
}

/// Marks paragraphs containing a fixed phrase as dense in both counts.
#[cfg(test)]
pub(crate) struct PhraseAnalyzer(pub &'static str);

#[cfg(test)]
impl TextAnalyzer for PhraseAnalyzer {
    fn analyze(&self, paragraphs: &[String]) -> Vec<ParagraphCounts> {
        paragraphs
            .iter()
            .map(|p| {
                let n = if p.contains(self.0) { 3 } else { 0 };
                ParagraphCounts {
                    chemical_mentions: n,
                    quantity_mentions: n,
                }
            })
            .collect()
    }
}
