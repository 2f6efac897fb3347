//! Supplementary-information downloads from the landing page.

use crate::config::{Delays, Selectors};
use crate::error::{HarvestError, HarvestResult, HarvestWarning};
use crate::session::Session;

/// Links clicked and per-link failures from one SI pass.
#[derive(Debug, Clone, Default)]
pub struct SupplementaryOutcome {
    /// Visible labels of the links whose click succeeded.
    pub triggered: Vec<String>,
    pub warnings: Vec<HarvestWarning>,
}

/// Case-sensitive literal substring match against any marker.
pub fn matches_marker(label: &str, markers: &[String]) -> bool {
    markers.iter().any(|m| label.contains(m.as_str()))
}

/// Click every SI link whose label carries a marker.
///
/// The browser saves the files into the session's download directory; the
/// pause after each click gives the transfer time to start before the next.
pub async fn download_supplementary(
    session: &mut Session,
    selectors: &Selectors,
    markers: &[String],
    delays: &Delays,
) -> HarvestResult<SupplementaryOutcome> {
    let mut outcome = SupplementaryOutcome::default();

    let panel = match session.locate(&selectors.about_panel).await {
        Ok(panel) => panel,
        Err(HarvestError::ElementNotFound(_)) => {
            tracing::info!("No article metadata panel; no supplementary files");
            return Ok(outcome);
        }
        Err(e) => return Err(e),
    };

    let links = session
        .locate_all_within(panel, &selectors.supplementary_link)
        .await?;

    // Read every label before clicking; a download may disturb the page.
    let mut labelled = Vec::with_capacity(links.len());
    for link in links {
        let label = session.text(link).await?.trim().to_string();
        labelled.push((link, label));
    }

    for (link, label) in labelled {
        if !matches_marker(&label, markers) {
            tracing::debug!("Skipping non-document link \"{label}\"");
            continue;
        }

        tracing::info!("Downloading supplementary file \"{label}\"");
        match session.click(link).await {
            Ok(()) => outcome.triggered.push(label),
            Err(e) => {
                let warning = HarvestWarning::SupplementaryDownloadFailed {
                    label,
                    reason: e.to_string(),
                };
                tracing::warn!("{warning}");
                outcome.warnings.push(warning);
            }
        }
        session.pause(delays.download_gap()).await;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarvestConfig;
    use crate::session::fake::{ClickAction, FakeDriver, FakeNode, FakePage, FakeSite};
    use std::path::PathBuf;

    const LANDING: &str = "https://doi.org/10.1039/abcd1234";

    fn markers() -> Vec<String> {
        HarvestConfig::default().supplementary_markers
    }

    fn landing(selectors: &Selectors, links: Vec<(&str, ClickAction)>) -> FakePage {
        let mut page = FakePage::new("<html>landing</html>");
        let panel = page.add(None, FakeNode::matching(selectors.about_panel.clone()));
        for (label, action) in links {
            page.add(
                Some(panel),
                FakeNode::matching(selectors.supplementary_link.clone())
                    .text(label)
                    .on_click(action),
            );
        }
        page
    }

    fn session(page: FakePage, download_dir: PathBuf) -> Session {
        let site = FakeSite::new().page(LANDING, page);
        let mut driver = FakeDriver::new(site, download_dir);
        driver.start_at(LANDING);
        Session::new(Box::new(driver), &Delays::default())
    }

    #[test]
    fn test_marker_matching_is_case_sensitive_substring() {
        let markers = markers();
        assert!(matches_marker("Supporting_Info.PDF", &markers));
        assert!(matches_marker("Crystal data (docx)", &markers));
        assert!(!matches_marker("ReadMe.txt", &markers));
        assert!(!matches_marker("Supporting info (Pdf)", &markers));
    }

    #[tokio::test(start_paused = true)]
    async fn test_downloads_only_marked_links() {
        let dir = tempfile::tempdir().unwrap();
        let selectors = Selectors::default();
        let page = landing(
            &selectors,
            vec![
                (
                    "Supplementary information PDF (1.2M)",
                    ClickAction::Download {
                        file_name: "c9sc01234a1.pdf".into(),
                    },
                ),
                ("ReadMe.txt", ClickAction::Fail),
            ],
        );
        let mut session = session(page, dir.path().to_path_buf());

        let outcome = download_supplementary(&mut session, &selectors, &markers(), &Delays::default())
            .await
            .unwrap();

        assert_eq!(outcome.triggered, vec!["Supplementary information PDF (1.2M)"]);
        assert!(outcome.warnings.is_empty());
        assert!(dir.path().join("c9sc01234a1.pdf").exists());
        tokio_test::assert_ok!(session.close().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_panel_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let selectors = Selectors::default();
        let mut session = session(FakePage::new("<html></html>"), dir.path().to_path_buf());

        let outcome = download_supplementary(&mut session, &selectors, &markers(), &Delays::default())
            .await
            .unwrap();
        assert!(outcome.triggered.is_empty());
        assert!(outcome.warnings.is_empty());
        tokio_test::assert_ok!(session.close().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_click_warns_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let selectors = Selectors::default();
        let page = landing(
            &selectors,
            vec![
                ("Figures (PDF)", ClickAction::Fail),
                (
                    "Tables (DOCX)",
                    ClickAction::Download {
                        file_name: "tables.docx".into(),
                    },
                ),
            ],
        );
        let mut session = session(page, dir.path().to_path_buf());

        let outcome = download_supplementary(&mut session, &selectors, &markers(), &Delays::default())
            .await
            .unwrap();

        assert_eq!(outcome.triggered, vec!["Tables (DOCX)"]);
        match outcome.warnings.as_slice() {
            [HarvestWarning::SupplementaryDownloadFailed { label, .. }] => {
                assert_eq!(label, "Figures (PDF)");
            }
            other => panic!("unexpected warnings: {other:?}"),
        }
        assert!(dir.path().join("tables.docx").exists());
        tokio_test::assert_ok!(session.close().await);
    }
}
