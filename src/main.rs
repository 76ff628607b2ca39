//! prefmap - COVID-19 infections by Japanese prefecture
//!
//! A CLI tool that sums daily infection counts over a date range and
//! renders them as a choropleth map of Japan's prefectures.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing or malformed input, unwritable output, etc.)
//!   3 - The selected range contains no records

mod analysis;
mod cli;
mod config;
mod dashboard;
mod loader;
mod models;
mod report;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use dashboard::{parse_range_command, Dashboard, RangeCommand, RangeInput, View};
use loader::{Boundaries, CaseTable};
use models::DateRange;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit code when the selected range has no records.
const NO_DATA_EXIT_CODE: i32 = 3;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("prefmap v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Rendering failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .prefmap.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE_NAME);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize data paths, map style and labels.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to set tracing subscriber: {}", e);
    }
}

/// Load the datasets and render. Returns the exit code.
fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Step 1: Load the datasets once
    println!("📥 Loading datasets...");
    let cases = CaseTable::from_path(Path::new(&config.data.cases))?;
    let boundaries = Boundaries::from_path(Path::new(&config.data.geojson))?;

    println!(
        "   {} case rows ({}), {} prefecture boundaries",
        cases.len(),
        cases.date_bounds(),
        boundaries.len()
    );

    let dashboard = Dashboard::new(&cases, &boundaries);
    let output = output_path(&args, &config);

    // Step 2: Render
    if args.interactive {
        run_interactive(&args, &config, &dashboard, &output)?;
        println!("\n👋 Session ended.");
        return Ok(0);
    }

    let bounds = dashboard.bounds();
    let requested = DateRange::new(
        args.start.unwrap_or(bounds.start),
        args.end.unwrap_or(bounds.end),
    );
    if requested.is_inverted() {
        warn!("Start date {} is after end date {}", requested.start, requested.end);
    }

    let has_data = render_to_file(&dashboard, requested, args.format, &config, &output)?;

    println!("   Duration: {:.2}s", start_time.elapsed().as_secs_f64());

    if !has_data {
        return Ok(NO_DATA_EXIT_CODE);
    }

    Ok(0)
}

/// Render one range and write it. Returns false if the range had no data.
fn render_to_file(
    dashboard: &Dashboard<'_>,
    range: DateRange,
    format: OutputFormat,
    config: &Config,
    output: &Path,
) -> Result<bool> {
    let view = dashboard.view(range);

    if let View::Map(ref map) = view {
        let unmatched = analysis::unmatched_features(&map.summaries, map.boundaries.features());
        if !unmatched.is_empty() {
            debug!(
                "{} boundaries have no records in range: {:?}",
                unmatched.len(),
                unmatched.iter().map(|f| f.id).collect::<Vec<_>>()
            );
        }
    }

    let content = report::render(&view, format, config)?;
    std::fs::write(output, &content)
        .with_context(|| format!("Failed to write output to {}", output.display()))?;

    println!("\n📊 {}", report::generate_summary_text(&view, config).replace('\n', "\n   "));

    match view {
        View::Map(_) => {
            println!("\n✅ Map saved to: {}", output.display());
            Ok(true)
        }
        View::NoData { .. } => {
            println!("\n⚠️  {} (written to {})", config.labels.no_data, output.display());
            Ok(false)
        }
    }
}

/// Read ranges from stdin and re-render whenever the selection changes.
fn run_interactive(
    args: &Args,
    config: &Config,
    dashboard: &Dashboard<'_>,
    output: &Path,
) -> Result<()> {
    let mut input = RangeInput::new(dashboard.bounds());
    input.update(args.start, args.end, |_| {});

    render_to_file(dashboard, input.current(), args.format, config, output)?;

    println!("\n⌨️  Enter `START END` (YYYY-MM-DD, `-` keeps a bound), or `q` to quit.");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read from stdin")?;

        let (start, end) = match parse_range_command(&line) {
            Ok(RangeCommand::Quit) => break,
            Ok(RangeCommand::Skip) => continue,
            Ok(RangeCommand::Select { start, end }) => (start, end),
            Err(e) => {
                eprintln!("   {}", e);
                continue;
            }
        };

        let mut result = Ok(());
        let changed = input.update(start, end, |range| {
            info!("Range changed to {}", range);
            result = render_to_file(dashboard, range, args.format, config, output).map(|_| ());
        });
        result?;

        if !changed {
            println!("   Range unchanged: {}", input.current());
        }
    }

    Ok(())
}

/// Resolve the output path: explicit flag, else the configured path with
/// the extension of the chosen format.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    match args.output {
        Some(ref path) => path.clone(),
        None => PathBuf::from(&config.report.output).with_extension(args.format.extension()),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
