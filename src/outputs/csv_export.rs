//! CSV export of the talk list.
//!
//! Two files share one fixed column order: every talk, and only the talks
//! that ended the run without a local PDF. Empty cells mean "absent".

use chrono::NaiveDate;
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use crate::models::Item;

/// One CSV line. Field order is the column order.
#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    resolved_path: Option<&'a Path>,
    canonical_uri: &'a str,
    date: NaiveDate,
    speaker: Option<&'a str>,
    title: Option<&'a str>,
    conference: &'a str,
    session: &'a str,
    public_url: &'a str,
    artifact_url: Option<&'a str>,
    reference: String,
    content_url: &'a str,
    local_artifact_path: Option<&'a Path>,
    local_render_path: Option<&'a Path>,
    conference_pdf_url: Option<&'a str>,
}

impl<'a> From<&'a Item> for ReportRow<'a> {
    fn from(item: &'a Item) -> Self {
        Self {
            resolved_path: item.resolved_path(),
            canonical_uri: &item.canonical_uri,
            date: item.date,
            speaker: item.speaker.as_deref(),
            title: item.title.as_deref(),
            conference: &item.conference,
            session: &item.session,
            public_url: &item.public_url,
            artifact_url: item.artifact_url.as_deref(),
            reference: item.reference(),
            content_url: &item.content_url,
            local_artifact_path: item.local_artifact_path.as_deref(),
            local_render_path: item.local_render_path.as_deref(),
            conference_pdf_url: item.conference_pdf_url.as_deref(),
        }
    }
}

/// Serialize `items` to CSV bytes, header included even when empty.
pub fn to_csv<'a>(items: impl IntoIterator<Item = &'a Item>) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());
    let mut wrote_any = false;
    for item in items {
        writer.serialize(ReportRow::from(item))?;
        wrote_any = true;
    }
    if !wrote_any {
        // serde-driven headers only appear with the first record
        writer.write_record(COLUMNS)?;
    }
    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

pub const COLUMNS: [&str; 14] = [
    "resolved_path",
    "canonical_uri",
    "date",
    "speaker",
    "title",
    "conference",
    "session",
    "public_url",
    "artifact_url",
    "reference",
    "content_url",
    "local_artifact_path",
    "local_render_path",
    "conference_pdf_url",
];

/// Write `all_{base}.csv` and `no_pdf_{base}.csv` under `dir`.
///
/// Returns the two paths written.
#[instrument(level = "info", skip(items), fields(count = items.len()))]
pub async fn write_reports(
    items: &[Item],
    dir: &Path,
    base: &str,
) -> Result<(PathBuf, PathBuf), Box<dyn Error>> {
    let all_path = dir.join(format!("all_{base}.csv"));
    let missing_path = dir.join(format!("no_pdf_{base}.csv"));

    fs::write(&all_path, to_csv(items)?).await?;
    let missing: Vec<&Item> = items.iter().filter(|i| i.resolved_path().is_none()).collect();
    fs::write(&missing_path, to_csv(missing.iter().copied())?).await?;

    info!(
        all = %all_path.display(),
        no_pdf = %missing_path.display(),
        missing = missing.len(),
        "Wrote CSV reports"
    );
    Ok((all_path, missing_path))
}
