//! Dataset loading.
//!
//! The case CSV and the boundary GeoJSON are read once at startup into
//! immutable tables. Everything downstream borrows these tables; nothing is
//! re-read while the process runs.

use crate::models::{CaseRecord, DateRange, GeoFeature, PrefectureCode};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Columns the case dataset must provide.
pub const REQUIRED_COLUMNS: [&str; 4] =
    ["Date", "Prefecture_name", "Prefecture_code", "Infections"];

/// Errors raised while turning raw files into tables.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("case dataset is missing column `{0}`")]
    MissingColumn(String),

    #[error("line {line}: cannot parse date `{value}`")]
    InvalidDate { line: u64, value: String },

    #[error("line {line}: invalid prefecture code `{value}`")]
    InvalidCode { line: u64, value: String },

    #[error("line {line}: invalid infection count `{value}`")]
    InvalidCount { line: u64, value: String },

    #[error("case dataset contains no rows")]
    EmptyDataset,

    #[error("boundary feature #{index} has no usable `id` property")]
    MissingFeatureId { index: usize },

    #[error("boundary file is not a FeatureCollection (found `{0}`)")]
    NotFeatureCollection(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Parse a calendar date, discarding any time of day.
///
/// Accepts `2020-01-16`, `2020/1/16`, `2020-01-16 09:00:00`,
/// `2020-01-16T09:00:00` and RFC 3339 timestamps.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Some(datetime.date());
        }
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|datetime| datetime.date_naive())
}

/// Parse an integer that may have been written as `13` or `13.0`.
fn parse_integral(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }
    value.parse::<f64>().ok().and_then(integral_from_f64)
}

/// Whole floats inside the `i64` range; `as` would saturate anything else.
fn integral_from_f64(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range
    const UPPER: f64 = i64::MAX as f64;
    const LOWER: f64 = i64::MIN as f64;

    if f.is_finite() && f.fract() == 0.0 && (LOWER..UPPER).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

/// One CSV row before type conversion.
#[derive(Debug, Deserialize)]
struct RawCaseRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Prefecture_name")]
    prefecture_name: String,
    #[serde(rename = "Prefecture_code")]
    prefecture_code: String,
    #[serde(rename = "Infections")]
    infections: String,
}

impl RawCaseRow {
    fn into_record(self, line: u64) -> Result<CaseRecord, LoadError> {
        let date = parse_date(&self.date).ok_or_else(|| LoadError::InvalidDate {
            line,
            value: self.date.clone(),
        })?;

        let prefecture_code =
            parse_integral(&self.prefecture_code).ok_or_else(|| LoadError::InvalidCode {
                line,
                value: self.prefecture_code.clone(),
            })?;

        let infections = parse_integral(&self.infections)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| LoadError::InvalidCount {
                line,
                value: self.infections.clone(),
            })?;

        Ok(CaseRecord::new(
            date,
            self.prefecture_name.trim(),
            prefecture_code,
            infections,
        ))
    }
}

/// The daily case dataset, held in memory.
#[derive(Debug, Clone)]
pub struct CaseTable {
    records: Vec<CaseRecord>,
    min_date: NaiveDate,
    max_date: NaiveDate,
}

impl CaseTable {
    /// Build a table from already-parsed records.
    pub fn new(records: Vec<CaseRecord>) -> Result<Self, LoadError> {
        let min_date = records
            .iter()
            .map(|r| r.date)
            .min()
            .ok_or(LoadError::EmptyDataset)?;
        let max_date = records
            .iter()
            .map(|r| r.date)
            .max()
            .ok_or(LoadError::EmptyDataset)?;

        Ok(Self {
            records,
            min_date,
            max_date,
        })
    }

    /// Parse a CSV stream with a header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(LoadError::MissingColumn(column.to_string()));
            }
        }

        let mut records = Vec::new();
        for row in csv_reader.records() {
            let row = row?;
            let line = row.position().map(|p| p.line()).unwrap_or_default();
            let raw: RawCaseRow = row.deserialize(Some(&headers))?;
            records.push(raw.into_record(line)?);
        }

        Self::new(records)
    }

    /// Load the case dataset from a CSV file.
    pub fn from_path(path: &Path) -> Result<Self> {
        info!("Loading case dataset: {}", path.display());

        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open case dataset: {}", path.display()))?;

        let table = Self::from_reader(file)
            .with_context(|| format!("Failed to parse case dataset: {}", path.display()))?;

        debug!(
            "Loaded {} case rows spanning {}",
            table.len(),
            table.date_bounds()
        );

        Ok(table)
    }

    /// All records in file order.
    pub fn records(&self) -> &[CaseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Earliest and latest dates present in the dataset.
    pub fn date_bounds(&self) -> DateRange {
        DateRange::new(self.min_date, self.max_date)
    }

    /// Clamp a requested range to the dataset's date bounds.
    pub fn clamp(&self, range: DateRange) -> DateRange {
        range.clamp_to(self.min_date, self.max_date)
    }
}

#[derive(Debug, Deserialize)]
struct RawFeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Value,
}

/// Read an `id` property that may be a number or a numeric string.
fn feature_code(value: &Value) -> Option<PrefectureCode> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral_from_f64)),
        Value::String(s) => parse_integral(s),
        _ => None,
    }
}

/// Prefecture boundaries, held in memory in file order.
#[derive(Debug, Clone, Default)]
pub struct Boundaries {
    features: Vec<GeoFeature>,
}

impl Boundaries {
    pub fn new(features: Vec<GeoFeature>) -> Self {
        Self { features }
    }

    /// Parse a GeoJSON FeatureCollection.
    pub fn from_geojson_str(content: &str) -> Result<Self, LoadError> {
        let collection: RawFeatureCollection = serde_json::from_str(content)?;
        if collection.kind != "FeatureCollection" {
            return Err(LoadError::NotFeatureCollection(collection.kind));
        }

        let mut features = Vec::with_capacity(collection.features.len());
        for (index, raw) in collection.features.into_iter().enumerate() {
            let properties = raw.properties.unwrap_or_default();
            let id = properties
                .get("id")
                .and_then(feature_code)
                .ok_or(LoadError::MissingFeatureId { index })?;
            let name_ja = properties
                .get("nam_ja")
                .and_then(Value::as_str)
                .map(str::to_string);

            features.push(GeoFeature {
                id,
                name_ja,
                geometry: raw.geometry,
                properties,
            });
        }

        Ok(Self::new(features))
    }

    /// Load boundaries from a GeoJSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        info!("Loading boundaries: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read boundary file: {}", path.display()))?;

        let boundaries = Self::from_geojson_str(&content)
            .with_context(|| format!("Failed to parse boundary file: {}", path.display()))?;

        debug!("Loaded {} boundary features", boundaries.len());
        Ok(boundaries)
    }

    pub fn features(&self) -> &[GeoFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }
}
