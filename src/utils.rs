//! Utility functions for calendar arithmetic, log formatting, and file system checks.
//!
//! - Calendar helpers for conference dates
//! - String truncation for logging upstream payloads
//! - Output directory validation and cache-file probing

use chrono::{Datelike, Duration, NaiveDate};
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::error::PipelineError;

/// First Sunday of `month` in `year`, or `None` for an impossible month.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(first_sunday(2023, 4), NaiveDate::from_ymd_opt(2023, 4, 2));
/// ```
pub fn first_sunday(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let days_to_add = (7 - first.weekday().num_days_from_sunday()) % 7;
    Some(first + Duration::days(i64::from(days_to_add)))
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (backing off to a char
/// boundary) with an ellipsis and byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// `true` when `path` is a regular file with at least one byte in it.
///
/// This is the whole cache-validity rule: no freshness check, no checksum.
pub async fn is_nonempty_file(path: &Path) -> bool {
    match fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Write `bytes` next to `path` and rename into place.
///
/// A crash mid-write leaves only the `.part` file, which the cache ignores.
pub async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    fs::write(&part, bytes).await?;
    fs::rename(&part, path).await
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns [`PipelineError::Setup`] if the directory cannot be created or
/// is not writable. Callers treat this as fatal.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), PipelineError> {
    let setup = |source| PipelineError::Setup {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(path).await.map_err(setup)?;

    // Sync write through std fs for a simpler error surface
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path).map_err(setup)?;
    let _ = stdfs::remove_file(&probe_path);
    debug!("Output directory is writable");
    info!("Output directory ready");
    Ok(())
}
