//! Per-talk artifact lookup.
//!
//! Each talk's content document may carry a downloadable PDF at
//! `content.meta.pdf.source`. The lookup runs at high fan-out with a tight
//! timeout and is never retried; a failure just leaves the talk without an
//! artifact URL.

use serde_json::Value;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::api::ContentApi;
use crate::error::{Outcome, PipelineError};
use crate::models::Item;

const PDF_SOURCE_POINTER: &str = "/content/meta/pdf/source";

/// Resolves artifact URLs through the per-URI content endpoint.
#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    api: ContentApi,
    timeout: Duration,
}

impl ArtifactResolver {
    pub fn new(api: ContentApi, timeout: Duration) -> Self {
        Self { api, timeout }
    }

    /// Look up the artifact URL for `item`.
    #[instrument(level = "debug", skip_all, fields(uri = %item.canonical_uri))]
    pub async fn resolve(&self, item: &Item) -> Outcome<String> {
        let body = match self.api.get_json(&item.content_url, self.timeout).await {
            Ok(body) => body,
            Err(e) => {
                let e = PipelineError::lookup(&item.content_url, e);
                warn!(error = %e, "Error getting talk content");
                return Outcome::Failed(e);
            }
        };

        match pdf_source(&body) {
            Some(url) => {
                info!(%url, "PDF URL found");
                Outcome::Found(url)
            }
            None => {
                warn!(url = %item.content_url, "No PDF URL found");
                Outcome::NotFound
            }
        }
    }

    /// Resolve and store the result on the item. The item always comes back.
    pub async fn enrich(&self, mut item: Item) -> Item {
        item.artifact_url = self.resolve(&item).await.ok();
        item
    }
}

/// The nested PDF source, if present and a non-empty string.
pub fn pdf_source(body: &Value) -> Option<String> {
    body.pointer(PDF_SOURCE_POINTER)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
