//! Collection fetching.
//!
//! Looks up one period's table of contents: primary locator first, then the
//! historical alias once. A usable response is parsed into a
//! [`CollectionDocument`] and only then persisted to `toc/{year}-{month}.json`,
//! overwriting any earlier snapshot.
//!
//! Nothing escapes this module as an error. Every failure is logged at warn
//! level with the attempted URL and reported as [`Outcome::NotFound`].

use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::api::ContentApi;
use crate::config::RunConfig;
use crate::error::{Outcome, PipelineError};
use crate::models::{CollectionDocument, Period, TableOfContents};
use crate::resolver::{self, ResourceLocator};
use crate::utils::truncate_for_log;

/// Fetches collection documents and keeps the snapshot store current.
#[derive(Debug, Clone)]
pub struct CollectionFetcher {
    api: ContentApi,
    config: RunConfig,
}

impl CollectionFetcher {
    pub fn new(api: ContentApi, config: RunConfig) -> Self {
        Self { api, config }
    }

    /// Snapshot path for a period, e.g. `toc/2023-04.json`.
    pub fn snapshot_path(&self, period: Period) -> PathBuf {
        self.config
            .toc_dir()
            .join(format!("{}-{:02}.json", period.year(), period.month()))
    }

    /// Fetch the collection document for `period`.
    ///
    /// Tries the primary locator for the period's era, then the historical
    /// alias once. A locator counts only if its response carries a `toc`
    /// object. The accepted `toc` is written to the snapshot store before it
    /// is returned.
    ///
    /// # Arguments
    ///
    /// * `period` - The conference to look up
    ///
    /// # Returns
    ///
    /// [`Outcome::Found`] with the parsed document, or [`Outcome::NotFound`]
    /// when neither locator produced one. Failures are logged here and never
    /// surface as [`Outcome::Failed`].
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let period = Period::new(2023, 4)?;
    /// if let Outcome::Found(doc) = fetcher.fetch(period).await {
    ///     assert_eq!(doc.period, period);
    /// }
    /// ```
    #[instrument(level = "info", skip(self), fields(%period))]
    pub async fn fetch(&self, period: Period) -> Outcome<CollectionDocument> {
        let primary = resolver::resolve(period, self.config.magazine_cutoff_year);
        let alias = resolver::fallback(period);

        let (raw, toc) = match self.try_locator(period, &primary).await {
            Ok(found) => found,
            Err(e) => {
                warn!(locator = %primary, error = %e, "Primary TOC lookup failed; trying alias");
                match self.try_locator(period, &alias).await {
                    Ok(found) => found,
                    Err(e) => {
                        warn!(locator = %alias, error = %e, "Alias TOC lookup failed");
                        let not_found = PipelineError::ResourceNotFound {
                            period,
                            tried: format!(
                                "{}, {}",
                                self.api.content_url(&primary.uri),
                                self.api.content_url(&alias.uri)
                            ),
                        };
                        warn!(error = %not_found, "Excluding period");
                        return Outcome::NotFound;
                    }
                }
            }
        };

        let path = self.snapshot_path(period);
        if let Err(e) = write_snapshot(&path, &raw).await {
            warn!(path = %path.display(), error = %e, "Failed to persist TOC snapshot");
        }

        info!(
            title = toc.title.as_deref().unwrap_or_default(),
            entries = toc.entries.len(),
            "TOC found"
        );
        Outcome::Found(CollectionDocument { period, toc })
    }

    /// One locator attempt. Returns the raw `toc` sub-document and its
    /// typed reading.
    async fn try_locator(
        &self,
        period: Period,
        locator: &ResourceLocator,
    ) -> Result<(Value, TableOfContents), String> {
        let url = self.api.content_url(&locator.uri);
        info!(year = period.year(), month = period.month(), scheme = %locator.scheme, %url, "Looking up TOC");

        let mut body = self
            .api
            .get_json(&url, self.config.collection_timeout())
            .await
            .map_err(|e| e.to_string())?;

        let raw = match body.get_mut("toc").map(Value::take) {
            Some(toc) if toc.is_object() => toc,
            _ => {
                return Err(format!(
                    "no toc in response: {}",
                    truncate_for_log(&body.to_string(), 200)
                ));
            }
        };
        let toc = TableOfContents::deserialize(&raw).map_err(|e| format!("unreadable toc: {e}"))?;
        Ok((raw, toc))
    }
}

async fn write_snapshot(path: &Path, toc: &Value) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(toc)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
