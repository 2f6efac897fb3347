//! Per-article orchestration.
//!
//! One [`Harvester::run`] owns one browser session from launch to close:
//! sign-in, full text, figures, supplementary files, then persistence.

use std::path::{Path, PathBuf};

use crate::analysis::{paragraphs_from_html, select_key_paragraphs, TextAnalyzer};
use crate::auth::Authenticator;
use crate::config::HarvestConfig;
use crate::error::{HarvestResult, HarvestWarning};
use crate::extract::{
    download_supplementary, extract_figures_with_retry, extract_text, SupplementaryOutcome,
};
use crate::identifier::ArticleRequest;
use crate::session::{BrowserLauncher, LaunchOptions, Session};
use crate::store::OutputStore;
use crate::types::{Credentials, OutputBundle};

/// Harvests articles one at a time with a fresh browser per article.
pub struct Harvester<L: BrowserLauncher> {
    config: HarvestConfig,
    launcher: L,
    store: OutputStore,
    analyzer: Option<Box<dyn TextAnalyzer>>,
}

impl<L: BrowserLauncher> Harvester<L> {
    pub fn new(config: HarvestConfig, launcher: L) -> Self {
        let store = OutputStore::new(config.output_root.clone());
        Self {
            config,
            launcher,
            store,
            analyzer: None,
        }
    }

    /// Select key paragraphs from the full text with `analyzer` after each run.
    pub fn with_analyzer(mut self, analyzer: Box<dyn TextAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    /// Harvest one article.
    ///
    /// The identifier is validated before any browser is launched. Once a
    /// session exists it is closed on every exit path; a failed teardown is
    /// logged and never replaces the run's own result.
    pub async fn run(
        &self,
        identifier: &str,
        credentials: Option<&Credentials>,
    ) -> HarvestResult<OutputBundle> {
        let article = ArticleRequest::parse(identifier, &self.config.portal)?;
        let base = self.store.prepare_directories(article.key())?;
        tracing::info!("Harvesting {} into {}", article.identifier(), base.display());

        let options = LaunchOptions {
            headless: self.config.headless,
            download_dir: base.clone(),
            open_pdf_externally: true,
            chrome_executable: self.config.chrome_executable.clone(),
            navigation_timeout: self.config.delays.navigation_timeout(),
        };
        let driver = self.launcher.launch(&options).await?;
        let mut session = Session::new(driver, &self.config.delays);

        let result = self.drive(&mut session, &article, &base, credentials).await;

        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close browser session: {e}");
        }

        match &result {
            Ok(bundle) => tracing::info!(
                "Harvested {}: {} figure(s), {} supplementary file(s), {} warning(s)",
                bundle.identifier,
                bundle.figure_paths.len(),
                bundle.supplementary.len(),
                bundle.warnings.len()
            ),
            Err(e) => tracing::error!("Harvest of {} failed: {e}", article.identifier()),
        }
        result
    }

    async fn drive(
        &self,
        session: &mut Session,
        article: &ArticleRequest,
        base: &Path,
        credentials: Option<&Credentials>,
    ) -> HarvestResult<OutputBundle> {
        let portal = &self.config.portal;
        let selectors = &portal.selectors;
        let delays = &self.config.delays;

        let probe_url = portal.probe_url.as_deref().unwrap_or(article.url());
        Authenticator::new(selectors, delays)
            .authenticate(session, probe_url, credentials)
            .await?;
        if probe_url != article.url() {
            session.navigate(article.url()).await?;
        }

        let html = extract_text(session, selectors, delays).await?;

        let figures = extract_figures_with_retry(session, selectors, delays).await?;
        let mut warnings: Vec<HarvestWarning> = figures.warning.into_iter().collect();

        // Supplementary links live on the landing page, not the full text.
        let supplementary = match self.supplementary(session, article).await {
            Ok(outcome) => {
                warnings.extend(outcome.warnings);
                outcome.triggered
            }
            Err(e) => {
                let warning = HarvestWarning::SupplementaryUnavailable {
                    reason: e.to_string(),
                };
                tracing::warn!("{warning}");
                warnings.push(warning);
                Vec::new()
            }
        };

        let raw_text_path = self.store.write_text(base, &html)?;
        let caption_index_path = self.store.write_caption_index(base, &figures.records)?;
        let figure_paths = self.store.write_images(base, &figures.records)?;

        let paragraph_paths = match &self.analyzer {
            Some(analyzer) => self.hand_off(analyzer.as_ref(), base, article.key(), &html)?,
            None => Vec::new(),
        };

        Ok(OutputBundle {
            identifier: article.identifier().to_string(),
            base_path: base.to_path_buf(),
            raw_text_path,
            caption_index_path,
            figure_paths,
            supplementary,
            paragraph_paths,
            warnings,
        })
    }

    async fn supplementary(
        &self,
        session: &mut Session,
        article: &ArticleRequest,
    ) -> HarvestResult<SupplementaryOutcome> {
        session.navigate(article.url()).await?;
        session.pause(self.config.delays.landing_settle()).await;
        download_supplementary(
            session,
            &self.config.portal.selectors,
            &self.config.supplementary_markers,
            &self.config.delays,
        )
        .await
    }

    fn hand_off(
        &self,
        analyzer: &dyn TextAnalyzer,
        base: &Path,
        key: &str,
        html: &str,
    ) -> HarvestResult<Vec<PathBuf>> {
        let paragraphs = paragraphs_from_html(html);
        let counts = analyzer.analyze(&paragraphs);
        let selected =
            select_key_paragraphs(&paragraphs, &counts, &self.config.paragraph_selection);
        tracing::info!(
            "Selected {} of {} paragraph(s) for analysis",
            selected.len(),
            paragraphs.len()
        );
        self.store.write_paragraphs(base, key, &selected)
    }
}
