//! Figure snapshots and captions.

use image::GenericImageView;

use crate::config::{Delays, Selectors};
use crate::error::{HarvestError, HarvestResult, HarvestWarning};
use crate::session::{ElementHandle, Session};
use crate::types::{single_line, ImageRecord, ImageRecords};

/// Result of figure extraction after the retry policy has run.
#[derive(Debug, Clone, Default)]
pub struct FigureOutcome {
    pub records: ImageRecords,
    /// Set when both passes failed and `records` is partial.
    pub warning: Option<HarvestWarning>,
}

/// One pass over every figure container on the full-text page.
///
/// Records are upserted into `records` as they are captured, so a failing
/// pass still leaves the figures it reached.
pub async fn extract_figures(
    session: &mut Session,
    selectors: &Selectors,
    records: &mut ImageRecords,
) -> HarvestResult<()> {
    let containers = session.locate_all(&selectors.figure_container).await?;
    tracing::debug!("Found {} figure container(s)", containers.len());

    for (ordinal, container) in (1u32..).zip(containers) {
        let record = capture_figure(session, selectors, ordinal, container).await?;
        records.upsert(record);
    }
    Ok(())
}

async fn capture_figure(
    session: &mut Session,
    selectors: &Selectors,
    ordinal: u32,
    container: ElementHandle,
) -> HarvestResult<ImageRecord> {
    let holder = session.locate_within(container, &selectors.figure_holder).await?;
    let img = session.locate_within(holder, &selectors.figure_image).await?;
    let source = session.attribute(img, "src").await?;

    let payload = session.screenshot(img).await?;
    let (width, height) = image::load_from_memory(&payload)
        .map(|decoded| decoded.dimensions())
        .map_err(|e| HarvestError::Snapshot(format!("figure {ordinal}: {e}")))?;
    if width == 0 || height == 0 {
        return Err(HarvestError::Snapshot(format!("figure {ordinal} rendered empty")));
    }

    // Structural and chemical-diagram figures often carry no caption.
    let caption = match session.locate_within(container, &selectors.figure_caption).await {
        Ok(el) => Some(single_line(&session.text(el).await?)).filter(|c| !c.is_empty()),
        Err(HarvestError::ElementNotFound(_)) => {
            tracing::debug!("Figure {ordinal} has no caption");
            None
        }
        Err(e) => return Err(e),
    };

    Ok(ImageRecord {
        ordinal,
        source,
        payload,
        width,
        height,
        caption,
    })
}

/// Run [`extract_figures`], retrying once after `figure_retry` if the pass
/// fails.
///
/// Figure failures never abort a run: a second failure of any kind is
/// downgraded to a [`HarvestWarning::PartialFigures`] carrying the records
/// gathered so far.
pub async fn extract_figures_with_retry(
    session: &mut Session,
    selectors: &Selectors,
    delays: &Delays,
) -> HarvestResult<FigureOutcome> {
    let mut records = ImageRecords::new();

    match extract_figures(session, selectors, &mut records).await {
        Ok(()) => return Ok(FigureOutcome { records, warning: None }),
        Err(e) if e.is_transient() => {
            tracing::warn!("Figure extraction failed ({e}); retrying once");
        }
        Err(e) => {
            tracing::warn!("Browser error during figure extraction ({e}); retrying once");
        }
    }

    session.pause(delays.figure_retry()).await;

    if let Err(e) = extract_figures(session, selectors, &mut records).await {
        let warning = HarvestWarning::PartialFigures {
            gathered: records.len(),
            reason: e.to_string(),
        };
        tracing::warn!("{warning}");
        return Ok(FigureOutcome {
            records,
            warning: Some(warning),
        });
    }
    Ok(FigureOutcome { records, warning: None })
}
