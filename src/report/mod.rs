//! Report rendering.
//!
//! Turns a dashboard view into one of the output formats.

pub mod generator;
pub mod map;
pub mod scale;

pub use generator::{
    generate_geojson, generate_json_report, generate_markdown_report, generate_summary_text,
};
pub use map::generate_html_page;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::dashboard::View;
use anyhow::Result;

/// Render a view in the requested format.
pub fn render(view: &View<'_>, format: OutputFormat, config: &Config) -> Result<String> {
    match format {
        OutputFormat::Html => generate_html_page(view, config),
        OutputFormat::Geojson => generate_geojson(view),
        OutputFormat::Json => generate_json_report(view, config),
        OutputFormat::Markdown => Ok(generate_markdown_report(view, config)),
    }
}
