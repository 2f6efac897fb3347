//! Content extractors.
//!
//! Page-state contracts:
//!
//! | extractor       | expects           | leaves            |
//! |-----------------|-------------------|-------------------|
//! | `text`          | landing page      | full-text page    |
//! | `figures`       | full-text page    | full-text page    |
//! | `supplementary` | landing page      | landing page      |

pub mod figures;
pub mod supplementary;
pub mod text;

pub use figures::{extract_figures, extract_figures_with_retry, FigureOutcome};
pub use supplementary::{download_supplementary, matches_marker, SupplementaryOutcome};
pub use text::extract_text;
