//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// prefmap - COVID-19 infections by Japanese prefecture on a choropleth map
///
/// Sums daily infection counts over a date range and renders them as an
/// HTML map, a joined GeoJSON file, a JSON summary or a Markdown table.
///
/// Examples:
///   prefmap --start 2020-04-01 --end 2020-05-31
///   prefmap --cases cases.csv --geojson japan.geojson -o map.html
///   prefmap --format geojson -o joined.geojson
///   prefmap --interactive
///   prefmap --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Daily case dataset (CSV)
    ///
    /// Needs the columns Date, Prefecture_name, Prefecture_code and Infections.
    #[arg(long, value_name = "FILE", env = "PREFMAP_CASES")]
    pub cases: Option<PathBuf>,

    /// Prefecture boundaries (GeoJSON)
    ///
    /// Each feature needs an `id` property holding the prefecture code.
    #[arg(long, value_name = "FILE", env = "PREFMAP_GEOJSON")]
    pub geojson: Option<PathBuf>,

    /// First day of the range (inclusive)
    ///
    /// Defaults to the earliest date in the dataset. Clamped to the dataset.
    #[arg(short, long, value_name = "DATE", value_parser = parse_cli_date)]
    pub start: Option<NaiveDate>,

    /// Last day of the range (inclusive)
    ///
    /// Defaults to the latest date in the dataset. Clamped to the dataset.
    #[arg(short, long, value_name = "DATE", value_parser = parse_cli_date)]
    pub end: Option<NaiveDate>,

    /// Output file path
    ///
    /// Defaults to the configured output with the extension of --format.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (html, geojson, json, markdown)
    #[arg(long, default_value = "html", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .prefmap.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of prefectures listed in the console summary
    #[arg(long, value_name = "COUNT")]
    pub top: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Read date ranges from stdin and re-render when the range changes
    ///
    /// Each line is `START END`; use `-` to keep a bound. `q` quits.
    #[arg(short, long)]
    pub interactive: bool,

    /// Generate a default .prefmap.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the rendered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Self-contained HTML page with a Leaflet map (default)
    #[default]
    Html,
    /// GeoJSON FeatureCollection of the joined prefectures
    Geojson,
    /// JSON summary table
    Json,
    /// Markdown summary table
    Markdown,
}

impl OutputFormat {
    /// File extension conventionally used for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Geojson => "geojson",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
        }
    }
}

/// clap value parser for `--start` / `--end`.
fn parse_cli_date(value: &str) -> Result<NaiveDate, String> {
    crate::loader::parse_date(value)
        .ok_or_else(|| format!("invalid date `{}` (expected YYYY-MM-DD)", value))
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(top) = self.top {
            if top == 0 {
                return Err("Top must be at least 1".to_string());
            }
        }

        for (flag, path) in [("--cases", &self.cases), ("--geojson", &self.geojson)] {
            if let Some(path) = path {
                if path.is_dir() {
                    return Err(format!("{} expects a file: {}", flag, path.display()));
                }
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
