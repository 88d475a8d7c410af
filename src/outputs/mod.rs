//! Report generation for a finished run.
//!
//! # Submodules
//!
//! - [`csv_export`]: every talk, plus the subset with no local file
//! - [`json`]: the full item list as JSON
//!
//! # Output Structure
//!
//! ```text
//! download_dir/
//! ├── all_talks.csv      # every talk, fixed column order
//! ├── no_pdf_talks.csv   # talks without a downloaded or printed PDF
//! ├── all_talks.json     # full item records
//! ├── toc/               # per-conference TOC snapshots
//! ├── talk_pdfs/         # downloaded PDFs, laid out by URL path
//! └── talk_prints/       # printed study pages
//! ```

pub mod csv_export;
pub mod json;
