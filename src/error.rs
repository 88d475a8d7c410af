//! Error taxonomy and the tagged result used at every component boundary.
//!
//! Almost nothing in the pipeline is fatal. Each component catches its own
//! failures, logs them, and hands back an [`Outcome`] so the caller can
//! record an absence in the [`Item`](crate::models::Item) instead of
//! aborting the run. Only [`PipelineError::Setup`] and
//! [`PipelineError::Config`] are allowed to stop a run.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::models::Period;

/// Every failure the pipeline knows how to name.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No locator scheme produced a usable collection document.
    #[error("no collection document for {period} (tried {tried})")]
    ResourceNotFound {
        /// The period being looked up.
        period: Period,
        /// Comma-separated list of the URLs that were attempted.
        tried: String,
    },

    /// A table-of-contents entry without an identifying URI.
    #[error("entry {index} of {period} ({session}) has no uri")]
    MalformedItem {
        period: Period,
        session: String,
        index: usize,
    },

    /// The per-item content lookup failed or had no artifact field.
    #[error("artifact lookup failed for {url}: {reason}")]
    ArtifactLookupFailed { url: String, reason: String },

    /// Download or render did not produce a usable local file.
    #[error("acquisition failed for {target}: {reason}")]
    AcquisitionFailed { target: String, reason: String },

    /// The headless renderer did not finish within the configured bound.
    #[error("render timed out after {0:?}")]
    RenderTimeout(Duration),

    /// The headless renderer failed to launch, navigate, or print.
    #[error("render engine failed: {0}")]
    RenderCrash(String),

    /// Output directories could not be created or written. Fatal.
    #[error("cannot prepare output directory {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid run configuration. Fatal.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn acquisition(target: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::AcquisitionFailed {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn lookup(url: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::ArtifactLookupFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Render failures surface as acquisition failures for the render path.
    pub fn into_acquisition(self, target: impl Into<String>) -> Self {
        match self {
            PipelineError::AcquisitionFailed { .. } => self,
            other => PipelineError::acquisition(target, other),
        }
    }
}

/// Result of one fallible lookup at a component boundary.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The lookup produced a value.
    Found(T),
    /// The lookup completed but the upstream had nothing to offer.
    NotFound,
    /// The lookup itself failed.
    Failed(PipelineError),
}

impl<T> Outcome<T> {
    /// Collapse into the nullable field the data model stores.
    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Found(value) => Some(value),
            Outcome::NotFound | Outcome::Failed(_) => None,
        }
    }
}

impl<T> From<Result<T, PipelineError>> for Outcome<T> {
    fn from(res: Result<T, PipelineError>) -> Self {
        match res {
            Ok(value) => Outcome::Found(value),
            Err(e) => Outcome::Failed(e),
        }
    }
}
