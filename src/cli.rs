//! Command-line interface definitions for gc_talks.
//!
//! Switches that also live in [`RunConfig`](crate::config::RunConfig) are
//! optional here so that an absent flag leaves the config file value alone.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for gc_talks.
///
/// # Examples
///
/// ```sh
/// # List talks for 2022-2024 and print the summary table
/// gc_talks -A
///
/// # Download talk PDFs, printing pages to PDF where no download exists
/// gc_talks --start-year 2008 --end-year 2024 -D -P --download-dir ./gc
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// First conference year to look up
    #[arg(long, default_value_t = 2022)]
    pub start_year: i32,

    /// Last conference year to look up (inclusive)
    #[arg(long, default_value_t = 2024)]
    pub end_year: i32,

    /// Conference months within each year
    #[arg(long, value_delimiter = ',', default_values_t = [4u32, 10u32])]
    pub months: Vec<u32>,

    /// Download per-talk PDFs when the content API exposes one
    #[arg(short = 'D', long)]
    pub download_talk_pdfs: bool,

    /// Print the talk's study page to PDF when no PDF was downloaded
    #[arg(short = 'P', long)]
    pub download_talk_prints: bool,

    /// Root of the local store (toc/, talk_pdfs/, talk_prints/, reports)
    #[arg(long, env = "GC_DOWNLOAD_DIR")]
    pub download_dir: Option<PathBuf>,

    /// Base name for the report files
    #[arg(short = 'O', long)]
    pub output_file: Option<String>,

    /// Print the per-conference summary table
    #[arg(short = 'A', long)]
    pub analyze: bool,

    /// Optional path to a YAML run configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Abort a single page render after this many seconds
    #[arg(long)]
    pub render_timeout_secs: Option<u64>,

    /// Append log output to this file instead of stdout
    #[arg(long, env = "GC_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["gc_talks"]);

        assert_eq!(cli.start_year, 2022);
        assert_eq!(cli.end_year, 2024);
        assert_eq!(cli.months, vec![4, 10]);
        assert!(!cli.download_talk_pdfs);
        assert!(!cli.download_talk_prints);
        assert!(!cli.analyze);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "gc_talks",
            "-D",
            "-P",
            "-A",
            "-O",
            "october",
            "--months",
            "10",
            "--download-dir",
            "/tmp/gc",
        ]);

        assert!(cli.download_talk_pdfs);
        assert!(cli.download_talk_prints);
        assert!(cli.analyze);
        assert_eq!(cli.output_file.as_deref(), Some("october"));
        assert_eq!(cli.months, vec![10]);
        assert_eq!(cli.download_dir, Some(PathBuf::from("/tmp/gc")));
    }
}
