//! Data report generation.
//!
//! This module generates the non-HTML outputs: the joined GeoJSON layer,
//! a JSON summary and a Markdown table.

use crate::analysis::{top_prefectures, total_infections};
use crate::config::Config;
use crate::dashboard::{MapView, View};
use crate::models::{DateRange, PrefectureSummary};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};

/// JSON form of a view.
#[derive(Debug, Serialize)]
pub struct SummaryReport<'a> {
    /// The clamped range the summary covers.
    pub range: DateRange,
    /// Earliest and latest dates in the dataset.
    pub dataset_bounds: DateRange,
    /// False when the range had no records.
    pub has_data: bool,
    /// Message shown instead of a map when `has_data` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'a str>,
    /// Nationwide total in the range.
    pub total_infections: u64,
    /// Per-prefecture rows, most infections first.
    pub prefectures: &'a [PrefectureSummary],
}

impl<'a> SummaryReport<'a> {
    pub fn from_view(view: &'a View<'_>, config: &'a Config) -> Self {
        match view {
            View::Map(map) => Self {
                range: map.range,
                dataset_bounds: map.bounds,
                has_data: true,
                message: None,
                total_infections: total_infections(&map.summaries),
                prefectures: &map.summaries,
            },
            View::NoData { range, bounds } => Self {
                range: *range,
                dataset_bounds: *bounds,
                has_data: false,
                message: Some(config.labels.no_data.as_str()),
                total_infections: 0,
                prefectures: &[],
            },
        }
    }
}

/// Generate a JSON summary.
pub fn generate_json_report(view: &View<'_>, config: &Config) -> Result<String> {
    let report = SummaryReport::from_view(view, config);
    serde_json::to_string_pretty(&report).map_err(Into::into)
}

/// GeoJSON FeatureCollection of joined prefectures.
///
/// Each feature keeps its original properties with the summary columns
/// added. A range without data yields an empty collection.
pub fn generate_geojson(view: &View<'_>) -> Result<String> {
    let features: Vec<Value> = match view {
        View::Map(map) => joined_features(map)?,
        View::NoData { .. } => Vec::new(),
    };

    let collection = json!({ "type": "FeatureCollection", "features": features });
    serde_json::to_string_pretty(&collection).context("Failed to serialize GeoJSON")
}

fn joined_features(map: &MapView<'_>) -> Result<Vec<Value>> {
    map.joined()
        .into_iter()
        .map(|joined| -> Result<Value> {
            let mut properties = joined.feature.properties.clone();
            if let Value::Object(summary) = serde_json::to_value(joined.summary)? {
                properties.extend(summary);
            }

            Ok(json!({
                "type": "Feature",
                "geometry": joined.feature.geometry,
                "properties": properties,
            }))
        })
        .collect()
}

/// Generate a Markdown report.
pub fn generate_markdown_report(view: &View<'_>, config: &Config) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", config.labels.page_title));
    output.push_str(&generate_range_section(view.range(), view.bounds(), config));

    match view {
        View::Map(map) => output.push_str(&generate_table_section(map, config)),
        View::NoData { .. } => output.push_str(&format!("**{}**\n\n", config.labels.no_data)),
    }

    output.push_str(&generate_footer());

    output
}

fn generate_range_section(range: DateRange, bounds: DateRange, config: &Config) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "- **{}** {}\n",
        config.labels.start_date,
        range.start.format("%Y-%m-%d")
    ));
    section.push_str(&format!(
        "- **{}** {}\n",
        config.labels.end_date,
        range.end.format("%Y-%m-%d")
    ));
    section.push_str(&format!("- **Dataset:** {}\n\n", bounds));

    section
}

fn generate_table_section(map: &MapView<'_>, config: &Config) -> String {
    let labels = &config.labels;
    let report = &config.report;
    let mut section = String::new();

    section.push_str(&format!(
        "| # | {} | Code | {} | {} | {} |\n",
        labels.name.trim_end_matches([':', ' ']),
        labels.infections.trim_end_matches([':', ' ']),
        labels.percentage.trim_end_matches([':', ' ']),
        labels.logarithm.trim_end_matches([':', ' ']),
    ));
    section.push_str("|---:|:---|---:|---:|---:|---:|\n");

    for (i, summary) in map.summaries.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {:.*} | {:.*} |\n",
            i + 1,
            escape_table_cell(&summary.prefecture_name),
            summary.prefecture_code,
            summary.infections,
            report.percentage_decimals,
            summary.infections_percentage,
            report.logarithm_decimals,
            summary.infections_logarithm,
        ));
    }

    section.push_str(&format!(
        "\n**Total:** {}\n\n",
        total_infections(&map.summaries)
    ));

    section
}

/// Keep a value inside one Markdown table cell.
fn escape_table_cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn generate_footer() -> String {
    "---\n\n*Generated by prefmap*\n".to_string()
}

/// Plain-text lines for the console summary.
pub fn generate_summary_text(view: &View<'_>, config: &Config) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Range: {}", view.range()));

    match view {
        View::Map(map) => {
            lines.push(format!("Prefectures: {}", map.summaries.len()));
            lines.push(format!(
                "Total infections: {}",
                total_infections(&map.summaries)
            ));
            for summary in top_prefectures(&map.summaries, config.report.top) {
                lines.push(format!(
                    "- {}: {} ({:.*}%)",
                    summary.prefecture_name,
                    summary.infections,
                    config.report.percentage_decimals,
                    summary.infections_percentage
                ));
            }
        }
        View::NoData { .. } => lines.push(config.labels.no_data.clone()),
    }

    lines.join("\n")
}
