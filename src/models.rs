//! Data models for conference periods, table-of-contents documents, and talks.
//!
//! - [`Period`]: one (year, month) publication cycle
//! - [`CollectionDocument`]: the typed subset of a conference table of contents
//! - [`Item`]: one talk, the unit of work and of output
//!
//! The TOC types mirror the upstream JSON loosely. Every field the extractor
//! reads is optional, a field of the wrong type reads as absent, and list
//! fields accept `null`. One odd entry must never cost the whole conference.

use chrono::{Month, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::utils::first_sunday;

/// One publication cycle, e.g. April 2023.
///
/// Fields are private so that every `Period` in the program has a month that
/// maps to a real calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Build a period, rejecting months that are not on the calendar.
    pub fn new(year: i32, month: u32) -> Result<Self, PipelineError> {
        if first_sunday(year, month).is_none() {
            return Err(PipelineError::Config(format!(
                "invalid period {year}-{month:02}: month must be 1..=12"
            )));
        }
        Ok(Self { year, month })
    }

    /// Every `month` of every year in `start..=end`, year-major.
    pub fn range(start: i32, end: i32, months: &[u32]) -> Result<Vec<Self>, PipelineError> {
        let mut periods = Vec::new();
        for year in start..=end {
            for &month in months {
                periods.push(Period::new(year, month)?);
            }
        }
        Ok(periods)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The Saturday before the first Sunday of the month, the conventional
    /// opening day of a conference.
    pub fn conference_date(&self) -> NaiveDate {
        let sunday = first_sunday(self.year, self.month).expect("validated in Period::new");
        sunday - chrono::Duration::days(1)
    }

    /// Human label such as `"April 2023"`.
    pub fn conference_name(&self) -> String {
        let name = u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name())
            .unwrap_or("Unknown");
        format!("{name} {}", self.year)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// A field of the wrong type reads as `None` instead of failing the document.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Like [`lenient`] for nested records, which must be JSON objects. serde
/// would otherwise fill a struct positionally from an array.
fn lenient_record<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(record(Value::deserialize(deserializer)?))
}

fn record<T: DeserializeOwned>(value: Value) -> Option<T> {
    match value {
        Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    }
}

/// Lists accept `null` or any non-array as empty. An element that is not a
/// readable record becomes `T::default()`, so it stays in place for the
/// extractor to report and drop.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values
            .into_iter()
            .map(|v| record(v).unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    })
}

/// A conference table of contents, fetched once per [`Period`].
#[derive(Debug, Clone)]
pub struct CollectionDocument {
    pub period: Period,
    pub toc: TableOfContents,
}

/// The `toc` object of a collection response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableOfContents {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub category: Option<String>,
    /// Whole-conference PDFs, only present in recent documents.
    #[serde(default, deserialize_with = "lenient_list")]
    pub pdf_downloads: Vec<PdfDownload>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub entries: Vec<TocEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PdfDownload {
    #[serde(default, deserialize_with = "lenient")]
    pub source: Option<String>,
}

/// One TOC entry: either a session wrapper, a talk, or (rarely) neither.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TocEntry {
    #[serde(default, deserialize_with = "lenient_record")]
    pub section: Option<Section>,
    #[serde(default, deserialize_with = "lenient_record")]
    pub content: Option<EntryContent>,
}

/// A conference session such as "Saturday Morning Session".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Section {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub entries: Vec<TocEntry>,
}

/// The talk reference inside a TOC entry. `subtitle` carries the speaker.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryContent {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub subtitle: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub uri: Option<String>,
}

/// One talk, flattened out of a [`CollectionDocument`] and enriched in place
/// by the artifact resolver and the acquirer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub period: Period,
    /// Opening Saturday of the conference.
    pub date: NaiveDate,
    /// Human label, e.g. "April 2023".
    pub conference: String,
    pub category: Option<String>,
    pub collection_title: Option<String>,
    /// Session title, or [`UNGROUPED_SESSION`] for entries outside a session.
    pub session: String,
    pub title: Option<String>,
    pub speaker: Option<String>,
    pub canonical_uri: String,
    pub content_url: String,
    pub public_url: String,
    pub conference_pdf_url: Option<String>,
    pub artifact_url: Option<String>,
    pub local_artifact_path: Option<PathBuf>,
    pub local_render_path: Option<PathBuf>,
}

/// Session label for entries that are not wrapped in a session.
pub const UNGROUPED_SESSION: &str = "Not Specified";

impl Item {
    /// The downloaded file if there is one, else the rendered one.
    pub fn resolved_path(&self) -> Option<&Path> {
        self.local_artifact_path
            .as_deref()
            .or(self.local_render_path.as_deref())
    }

    /// `"{category}-{collection title}"`, the magazine reference.
    pub fn reference(&self) -> String {
        format!(
            "{}-{}",
            self.category.as_deref().unwrap_or_default(),
            self.collection_title.as_deref().unwrap_or_default()
        )
    }

    /// Last path segment of the canonical URI, e.g. `11jones`.
    pub fn slug(&self) -> &str {
        self.canonical_uri
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}
