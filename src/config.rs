//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.prefmap.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".prefmap.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input dataset locations.
    #[serde(default)]
    pub data: DataConfig,

    /// Map appearance.
    #[serde(default)]
    pub map: MapConfig,

    /// User-facing text.
    #[serde(default)]
    pub labels: LabelConfig,

    /// Report output settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Input dataset locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Daily case CSV.
    #[serde(default = "default_cases")]
    pub cases: String,

    /// Prefecture boundary GeoJSON.
    #[serde(default = "default_geojson")]
    pub geojson: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cases: default_cases(),
            geojson: default_geojson(),
        }
    }
}

fn default_cases() -> String {
    "./data/japan_covid_19_cases_daily.csv".to_string()
}

fn default_geojson() -> String {
    "./data/japan.geojson".to_string()
}

/// Map appearance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Initial map center latitude.
    #[serde(default = "default_center_lat")]
    pub center_lat: f64,

    /// Initial map center longitude.
    #[serde(default = "default_center_lon")]
    pub center_lon: f64,

    /// Initial zoom level.
    #[serde(default = "default_zoom")]
    pub zoom: u8,

    /// Tile URL template.
    #[serde(default = "default_tiles")]
    pub tiles: String,

    /// Tile attribution HTML.
    #[serde(default = "default_attribution")]
    pub attribution: String,

    /// Fill opacity of prefectures with data.
    #[serde(default = "default_fill_opacity")]
    pub fill_opacity: f64,

    /// Fill color of prefectures without data.
    #[serde(default = "default_nan_fill_color")]
    pub nan_fill_color: String,

    /// Fill opacity of prefectures without data.
    #[serde(default = "default_fill_opacity")]
    pub nan_fill_opacity: f64,

    /// Opacity of prefecture borders.
    #[serde(default = "default_line_opacity")]
    pub line_opacity: f64,

    /// Height of the map element in pixels.
    #[serde(default = "default_height")]
    pub height_px: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_lat: default_center_lat(),
            center_lon: default_center_lon(),
            zoom: default_zoom(),
            tiles: default_tiles(),
            attribution: default_attribution(),
            fill_opacity: default_fill_opacity(),
            nan_fill_color: default_nan_fill_color(),
            nan_fill_opacity: default_fill_opacity(),
            line_opacity: default_line_opacity(),
            height_px: default_height(),
        }
    }
}

fn default_center_lat() -> f64 {
    36.56583
}

fn default_center_lon() -> f64 {
    139.88361
}

fn default_zoom() -> u8 {
    5
}

fn default_tiles() -> String {
    "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png".to_string()
}

fn default_attribution() -> String {
    "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors \
     &copy; <a href=\"https://carto.com/attributions\">CARTO</a>"
        .to_string()
}

fn default_fill_opacity() -> f64 {
    0.8
}

fn default_nan_fill_color() -> String {
    "darkgray".to_string()
}

fn default_line_opacity() -> f64 {
    0.2
}

fn default_height() -> u32 {
    720
}

/// Text shown on the page and in tooltips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    /// Page title and heading.
    #[serde(default = "default_page_title")]
    pub page_title: String,

    /// Message shown when the range has no records.
    #[serde(default = "default_no_data")]
    pub no_data: String,

    /// Heading of the range sidebar.
    #[serde(default = "default_filter_heading")]
    pub filter_heading: String,

    /// Label of the start date.
    #[serde(default = "default_start_date")]
    pub start_date: String,

    /// Label of the end date.
    #[serde(default = "default_end_date")]
    pub end_date: String,

    /// Tooltip label for the prefecture name.
    #[serde(default = "default_name_label")]
    pub name: String,

    /// Tooltip label for the infection count.
    #[serde(default = "default_infections_label")]
    pub infections: String,

    /// Tooltip label for the nationwide share.
    #[serde(default = "default_percentage_label")]
    pub percentage: String,

    /// Tooltip label for the logarithm.
    #[serde(default = "default_logarithm_label")]
    pub logarithm: String,

    /// Caption of the color legend.
    #[serde(default = "default_legend")]
    pub legend: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            page_title: default_page_title(),
            no_data: default_no_data(),
            filter_heading: default_filter_heading(),
            start_date: default_start_date(),
            end_date: default_end_date(),
            name: default_name_label(),
            infections: default_infections_label(),
            percentage: default_percentage_label(),
            logarithm: default_logarithm_label(),
            legend: default_legend(),
        }
    }
}

fn default_page_title() -> String {
    "指定期間の都道府県別の新型コロナ感染割合".to_string()
}

fn default_no_data() -> String {
    "該当データなし".to_string()
}

fn default_filter_heading() -> String {
    "絞り込み".to_string()
}

fn default_start_date() -> String {
    "開始日".to_string()
}

fn default_end_date() -> String {
    "終了日".to_string()
}

fn default_name_label() -> String {
    "都道府県名: ".to_string()
}

fn default_infections_label() -> String {
    "感染者数: ".to_string()
}

fn default_percentage_label() -> String {
    "全国の割合: ".to_string()
}

fn default_logarithm_label() -> String {
    "対数スケール: ".to_string()
}

fn default_legend() -> String {
    "Infections_logarithm".to_string()
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Decimal places shown for percentages.
    #[serde(default = "default_percentage_decimals")]
    pub percentage_decimals: usize,

    /// Decimal places shown for logarithms.
    #[serde(default = "default_logarithm_decimals")]
    pub logarithm_decimals: usize,

    /// Number of prefectures listed in the console summary.
    #[serde(default = "default_top")]
    pub top: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            percentage_decimals: default_percentage_decimals(),
            logarithm_decimals: default_logarithm_decimals(),
            top: default_top(),
        }
    }
}

fn default_output() -> String {
    "prefmap.html".to_string()
}

fn default_percentage_decimals() -> usize {
    2
}

fn default_logarithm_decimals() -> usize {
    4
}

fn default_top() -> usize {
    5
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from `dir/.prefmap.toml`.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref cases) = args.cases {
            self.data.cases = cases.display().to_string();
        }
        if let Some(ref geojson) = args.geojson {
            self.data.geojson = geojson.display().to_string();
        }
        if let Some(ref output) = args.output {
            self.report.output = output.display().to_string();
        }
        if let Some(top) = args.top {
            self.report.top = top;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data.geojson, "./data/japan.geojson");
        assert_eq!(config.map.zoom, 5);
        assert_eq!(config.map.nan_fill_color, "darkgray");
        assert_eq!(config.labels.no_data, "該当データなし");
        assert_eq!(config.report.output, "prefmap.html");
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r##"
[data]
cases = "cases.csv"

[map]
zoom = 6
nan_fill_color = "#cccccc"

[labels]
no_data = "No data"
"##;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.data.cases, "cases.csv");
        assert_eq!(config.data.geojson, "./data/japan.geojson");
        assert_eq!(config.map.zoom, 6);
        assert_eq!(config.map.nan_fill_color, "#cccccc");
        assert_eq!(config.map.fill_opacity, 0.8);
        assert_eq!(config.labels.no_data, "No data");
        assert_eq!(config.labels.name, "都道府県名: ");
        assert_eq!(config.report.percentage_decimals, 2);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[data]"));
        assert!(toml_str.contains("[map]"));
        assert!(toml_str.contains("[labels]"));
        assert!(toml_str.contains("[report]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.map.center_lat, 36.56583);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[report]\ntop = 3\n").unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.report.top, 3);
    }

    #[test]
    fn test_invalid_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[map]\nzoom = \"far\"\n").unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }
}
