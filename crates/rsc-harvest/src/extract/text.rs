//! Full-text markup capture.

use crate::config::{Delays, Selectors};
use crate::error::HarvestResult;
use crate::session::Session;

/// Open the full-text view and return the rendered page markup.
///
/// A missing trigger is fatal: it means the session is not authorized.
pub async fn extract_text(
    session: &mut Session,
    selectors: &Selectors,
    delays: &Delays,
) -> HarvestResult<String> {
    let trigger = session.locate(&selectors.full_text_trigger).await?;
    session.click(trigger).await?;
    session.pause(delays.render_settle()).await;

    let html = session.page_source().await?;
    tracing::debug!("Captured {} bytes of article markup", html.len());
    Ok(html)
}
