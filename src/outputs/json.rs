//! JSON dump of the full talk list.
//!
//! Written as `all_{base}.json` next to the CSV reports so that a later
//! tool can reload every field, including the ones the CSV flattens.

use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use crate::models::Item;

/// Write `items` to `{dir}/all_{base}.json`.
#[instrument(level = "info", skip(items), fields(count = items.len()))]
pub async fn write_items(items: &[Item], dir: &Path, base: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(items)?;
    let path = dir.join(format!("all_{base}.json"));
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote JSON item list");
    Ok(path)
}
