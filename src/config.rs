//! Run configuration.
//!
//! [`RunConfig`] is built once in `main` and passed by reference into the
//! pipeline. Defaults come from [`Default`], an optional YAML file overlays
//! them, and explicit command-line flags win over both.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::cli::Cli;
use crate::error::PipelineError;

pub const DEFAULT_CONTENT_URL: &str =
    "https://www.churchofjesuschrist.org/study/api/v3/language-pages/type/dynamic?lang=eng&uri=";
pub const DEFAULT_STUDY_URL: &str = "https://www.churchofjesuschrist.org/study";

/// Everything a run needs to know, in one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Prefix for per-URI JSON lookups; a canonical URI is appended verbatim.
    pub base_content_url: String,
    /// Prefix for the public study page of a URI.
    pub base_study_url: String,
    /// First year looked up through the magazine path instead of the
    /// general-conference path.
    pub magazine_cutoff_year: i32,

    pub collection_timeout_ms: u64,
    pub artifact_timeout_ms: u64,
    pub download_timeout_ms: u64,
    /// Upper bound for one headless render. `None` leaves renders unbounded.
    pub render_timeout_secs: Option<u64>,

    pub collection_concurrency: usize,
    pub artifact_concurrency: usize,
    pub acquire_concurrency: usize,
    /// Simultaneous pages in the shared headless browser.
    pub render_concurrency: usize,

    /// Download the artifact URL when one was resolved.
    pub download_talk_pdfs: bool,
    /// Print the public page to PDF when no download succeeded.
    pub download_talk_prints: bool,
    pub download_dir: PathBuf,
    /// Base name for the report files.
    pub output_file: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_content_url: DEFAULT_CONTENT_URL.to_string(),
            base_study_url: DEFAULT_STUDY_URL.to_string(),
            magazine_cutoff_year: 2025,
            collection_timeout_ms: 5_000,
            artifact_timeout_ms: 1_000,
            download_timeout_ms: 10_000,
            render_timeout_secs: None,
            collection_concurrency: 1,
            artifact_concurrency: 10,
            acquire_concurrency: 10,
            render_concurrency: 2,
            download_talk_pdfs: false,
            download_talk_prints: false,
            download_dir: PathBuf::from("/tmp/gc_download"),
            output_file: "talks".to_string(),
        }
    }
}

impl RunConfig {
    /// Load a YAML overlay; keys that are absent keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, PipelineError> {
        serde_yaml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Defaults, then the optional config file, then explicit flags.
    pub fn from_cli(cli: &Cli) -> Result<Self, PipelineError> {
        let mut config = match &cli.config {
            Some(path) => {
                let config = Self::from_yaml_file(path)?;
                info!(path = %path.display(), "Loaded configuration file");
                config
            }
            None => Self::default(),
        };

        if cli.download_talk_pdfs {
            config.download_talk_pdfs = true;
        }
        if cli.download_talk_prints {
            config.download_talk_prints = true;
        }
        if let Some(dir) = &cli.download_dir {
            config.download_dir = dir.clone();
        }
        if let Some(name) = &cli.output_file {
            config.output_file = name.clone();
        }
        if let Some(secs) = cli.render_timeout_secs {
            config.render_timeout_secs = Some(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let pools = [
            ("collection_concurrency", self.collection_concurrency),
            ("artifact_concurrency", self.artifact_concurrency),
            ("acquire_concurrency", self.acquire_concurrency),
            ("render_concurrency", self.render_concurrency),
        ];
        for (name, size) in pools {
            if size == 0 {
                return Err(PipelineError::Config(format!("{name} must be at least 1")));
            }
        }
        if self.output_file.trim().is_empty() {
            return Err(PipelineError::Config("output_file must not be empty".into()));
        }
        Ok(())
    }

    pub fn collection_timeout(&self) -> Duration {
        Duration::from_millis(self.collection_timeout_ms)
    }

    pub fn artifact_timeout(&self) -> Duration {
        Duration::from_millis(self.artifact_timeout_ms)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_millis(self.download_timeout_ms)
    }

    pub fn render_timeout(&self) -> Option<Duration> {
        self.render_timeout_secs.map(Duration::from_secs)
    }

    pub fn toc_dir(&self) -> PathBuf {
        self.download_dir.join("toc")
    }

    pub fn talk_pdfs_dir(&self) -> PathBuf {
        self.download_dir.join("talk_pdfs")
    }

    pub fn talk_prints_dir(&self) -> PathBuf {
        self.download_dir.join("talk_prints")
    }
}
