//! The discovery-and-retrieval pipeline.
//!
//! ```text
//! periods ──(collection pool)──► TOCs ──extract──► talks
//!         ──(artifact pool)────► talks + PDF URL
//!         ──(acquire pool)─────► talks + local files
//! ```
//!
//! Each stage is a bounded fan-out with its own width. Results stay in input
//! order (`buffered`, not `buffer_unordered`), so a re-run over the same
//! upstream data produces the same report. No stage can fail the run: a
//! missing TOC drops its period, every other failure leaves a `None` on the
//! talk.

use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::acquirer::Acquirer;
use crate::api::ContentApi;
use crate::artifact::ArtifactResolver;
use crate::config::RunConfig;
use crate::error::{Outcome, PipelineError};
use crate::extractor::extract;
use crate::fetcher::CollectionFetcher;
use crate::models::{CollectionDocument, Item, Period};
use crate::render::Renderer;
use crate::summary::Summary;
use crate::utils::ensure_writable_dir;

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    pub items: Vec<Item>,
    pub summary: Summary,
    /// Periods for which no collection document could be found.
    pub missing_periods: Vec<Period>,
}

/// Owns the stage components and the configuration they share.
#[derive(Debug)]
pub struct Orchestrator<R> {
    config: RunConfig,
    api: ContentApi,
    fetcher: CollectionFetcher,
    artifacts: ArtifactResolver,
    acquirer: Acquirer<R>,
}

impl<R: Renderer> Orchestrator<R> {
    pub fn new(config: RunConfig, renderer: R) -> Result<Self, PipelineError> {
        config.validate()?;
        let api = ContentApi::new(&config)
            .map_err(|e| PipelineError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            fetcher: CollectionFetcher::new(api.clone(), config.clone()),
            artifacts: ArtifactResolver::new(api.clone(), config.artifact_timeout()),
            acquirer: Acquirer::new(api.clone(), renderer, &config),
            api,
            config,
        })
    }

    /// Create the local store. The only fatal step of a run.
    pub async fn prepare(&self) -> Result<(), PipelineError> {
        ensure_writable_dir(&self.config.download_dir).await?;
        ensure_writable_dir(&self.config.toc_dir()).await?;
        self.acquirer.prepare_dirs().await
    }

    /// Run all stages over `periods`.
    ///
    /// Call [`Orchestrator::prepare`] first. Nothing inside a run is fatal:
    /// periods without a table of contents are reported as missing, and
    /// talks that could not be resolved or acquired keep `None` fields.
    ///
    /// # Arguments
    ///
    /// * `periods` - The conferences to process, in report order
    ///
    /// # Returns
    ///
    /// A [`RunReport`] with every talk found, in period then document order,
    /// its summary counters and the periods that were skipped.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let orchestrator = Orchestrator::new(config, renderer)?;
    /// orchestrator.prepare().await?;
    /// let report = orchestrator.run(&Period::range(2022, 2024, &[4, 10])?).await;
    /// println!("{}", report.summary.to_table());
    /// ```
    #[instrument(level = "info", skip_all, fields(periods = periods.len()))]
    pub async fn run(&self, periods: &[Period]) -> RunReport {
        let t0 = Instant::now();
        let (documents, missing_periods) = self.fetch_collections(periods).await;
        info!(
            found = documents.len(),
            missing = missing_periods.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Collection stage complete"
        );

        let t0 = Instant::now();
        let items: Vec<Item> = documents
            .iter()
            .flat_map(|doc| extract(doc, &self.api))
            .collect();
        let items = self.resolve_artifacts(items).await;
        info!(
            talks = items.len(),
            with_pdf = items.iter().filter(|i| i.artifact_url.is_some()).count(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Artifact stage complete"
        );

        let t0 = Instant::now();
        let items = self.acquire_all(items).await;
        info!(
            resolved = items.iter().filter(|i| i.resolved_path().is_some()).count(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Acquisition stage complete"
        );

        let summary = Summary::from_items(&items);
        RunReport {
            items,
            summary,
            missing_periods,
        }
    }

    async fn fetch_collections(&self, periods: &[Period]) -> (Vec<CollectionDocument>, Vec<Period>) {
        let outcomes: Vec<(Period, Outcome<CollectionDocument>)> = stream::iter(periods.iter().copied())
            .map(|period| async move { (period, self.fetcher.fetch(period).await) })
            .buffered(self.config.collection_concurrency)
            .collect()
            .await;

        let mut documents = Vec::new();
        let mut missing = Vec::new();
        for (period, outcome) in outcomes {
            match outcome.ok() {
                Some(doc) => documents.push(doc),
                None => {
                    warn!(%period, "No TOC found; skipping conference");
                    missing.push(period);
                }
            }
        }
        (documents, missing)
    }

    async fn resolve_artifacts(&self, items: Vec<Item>) -> Vec<Item> {
        stream::iter(items)
            .map(|item| self.artifacts.enrich(item))
            .buffered(self.config.artifact_concurrency)
            .collect()
            .await
    }

    async fn acquire_all(&self, items: Vec<Item>) -> Vec<Item> {
        if !self.config.download_talk_pdfs && !self.config.download_talk_prints {
            info!("Downloads and prints disabled; skipping acquisition");
            return items;
        }
        stream::iter(items)
            .map(|item| self.acquirer.acquire(item))
            .buffered(self.config.acquire_concurrency)
            .collect()
            .await
    }

    /// Release the renderer.
    pub async fn shutdown(self) {
        self.acquirer.into_renderer().close().await;
    }
}
