//! # gc_talks
//!
//! Discovers General Conference talks through the Gospel Library content
//! API, resolves a PDF for each one, and stores the PDFs locally together
//! with CSV and JSON reports of every talk found.
//!
//! ## Usage
//!
//! ```sh
//! gc_talks --start-year 2008 --end-year 2024 -D -P -A --download-dir ./gc
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Collections**: Locate and fetch each conference's table of contents
//!    (one at a time, the TOC endpoint is rate sensitive)
//! 2. **Extraction**: Flatten each TOC into talk records
//! 3. **Artifacts**: Look up each talk's PDF URL (10 at a time)
//! 4. **Acquisition**: Download the PDF, or print the study page to PDF as
//!    a fallback (10 at a time, renders bounded separately)
//! 5. **Output**: Write CSV and JSON reports and the summary table

use clap::Parser;
use std::error::Error;
use std::fs::OpenOptions;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod acquirer;
mod api;
mod artifact;
mod cli;
mod config;
mod error;
mod extractor;
mod fetcher;
mod models;
mod outputs;
mod pipeline;
mod render;
mod resolver;
mod summary;
mod utils;

use cli::Cli;
use config::RunConfig;
use models::Period;
use outputs::{csv_export, json};
use pipeline::Orchestrator;
use render::{BoundedRenderer, ChromeRenderer};

fn init_tracing(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339());

    match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    init_tracing(&args)?;

    let start_time = Instant::now();
    info!("gc_talks starting up");
    debug!(?args, "Parsed CLI arguments");

    let config = RunConfig::from_cli(&args)?;
    let periods = Period::range(args.start_year, args.end_year, &args.months)?;
    info!(
        conferences = periods.len(),
        first = ?periods.first().map(ToString::to_string),
        last = ?periods.last().map(ToString::to_string),
        download_pdfs = config.download_talk_pdfs,
        print_pages = config.download_talk_prints,
        download_dir = %config.download_dir.display(),
        "Run configured"
    );
    if config.download_talk_prints && config.render_timeout_secs.is_none() {
        warn!("No render timeout configured; a hung page render stalls its worker");
    }

    let renderer = BoundedRenderer::new(
        ChromeRenderer::new(),
        config.render_concurrency,
        config.render_timeout(),
    );
    let orchestrator = Orchestrator::new(config.clone(), renderer)?;

    // Early check: without a writable store there is nowhere to put anything
    if let Err(e) = orchestrator.prepare().await {
        error!(error = %e, "Output directory is not usable (fix perms or choose a different path)");
        return Err(e.into());
    }

    let report = orchestrator.run(&periods).await;
    orchestrator.shutdown().await;

    if !report.missing_periods.is_empty() {
        let missing: Vec<String> = report.missing_periods.iter().map(ToString::to_string).collect();
        warn!(?missing, "Conferences without a table of contents");
    }

    csv_export::write_reports(&report.items, &config.download_dir, &config.output_file).await?;
    json::write_items(&report.items, &config.download_dir, &config.output_file).await?;

    report.summary.log();
    if args.analyze {
        println!("{}", report.summary.to_table());
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        talks = report.items.len(),
        "Execution complete"
    );
    Ok(())
}
