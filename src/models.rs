//! Data models for the prefecture map.
//!
//! This module contains the core data structures shared by the loader,
//! the aggregator and the renderers: raw case rows, per-prefecture
//! summaries, boundary features and date ranges.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Prefecture code used as the join key between cases and boundaries.
pub type PrefectureCode = i64;

/// A single row of the daily case dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Reporting date (time of day discarded).
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    /// Prefecture display name as written in the dataset.
    #[serde(rename = "Prefecture_name")]
    pub prefecture_name: String,
    /// Numeric prefecture code.
    #[serde(rename = "Prefecture_code")]
    pub prefecture_code: PrefectureCode,
    /// Number of new infections reported on that date.
    #[serde(rename = "Infections")]
    pub infections: u64,
}

impl CaseRecord {
    /// Creates a new case record.
    pub fn new(
        date: NaiveDate,
        prefecture_name: impl Into<String>,
        prefecture_code: PrefectureCode,
        infections: u64,
    ) -> Self {
        Self {
            date,
            prefecture_name: prefecture_name.into(),
            prefecture_code,
            infections,
        }
    }
}

/// Infection totals for one prefecture over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefectureSummary {
    #[serde(rename = "Prefecture_name")]
    pub prefecture_name: String,
    #[serde(rename = "Prefecture_code")]
    pub prefecture_code: PrefectureCode,
    /// Sum of infections in the range.
    #[serde(rename = "Infections")]
    pub infections: u64,
    /// `ln(infections)`, or 0 when there were no infections.
    #[serde(rename = "Infections_logarithm")]
    pub infections_logarithm: f64,
    /// Share of the nationwide total in the range, in percent.
    #[serde(rename = "Infections_Percentage")]
    pub infections_percentage: f64,
}

/// A prefecture boundary from the GeoJSON dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoFeature {
    /// Prefecture code read from the `id` property.
    pub id: PrefectureCode,
    /// Japanese display name read from the `nam_ja` property.
    pub name_ja: Option<String>,
    /// Raw GeoJSON geometry object.
    pub geometry: Value,
    /// All original properties, including `id` and `nam_ja`.
    pub properties: Map<String, Value>,
}

impl GeoFeature {
    /// Returns the display name, falling back to the code.
    pub fn display_name(&self) -> String {
        self.name_ja
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// A boundary paired with the summary it joined against.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedFeature<'a> {
    pub feature: &'a GeoFeature,
    pub summary: &'a PrefectureSummary,
}

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a new range. `start` may be after `end`, in which case the
    /// range contains no dates.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Returns true if `date` lies within the range, bounds included.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Returns true if no date can satisfy the range.
    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    /// Clamps both bounds into `[min, max]`.
    pub fn clamp_to(&self, min: NaiveDate, max: NaiveDate) -> Self {
        Self {
            start: self.start.clamp(min, max),
            end: self.end.clamp(min, max),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ~ {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_range_contains_is_inclusive() {
        let range = DateRange::new(date(2020, 1, 1), date(2020, 1, 31));
        assert!(range.contains(date(2020, 1, 1)));
        assert!(range.contains(date(2020, 1, 31)));
        assert!(!range.contains(date(2019, 12, 31)));
        assert!(!range.contains(date(2020, 2, 1)));
    }

    #[test]
    fn test_range_clamp() {
        let range = DateRange::new(date(2019, 6, 1), date(2021, 6, 1));
        let clamped = range.clamp_to(date(2020, 1, 16), date(2020, 12, 31));
        assert_eq!(clamped.start, date(2020, 1, 16));
        assert_eq!(clamped.end, date(2020, 12, 31));

        let inside = DateRange::new(date(2020, 3, 1), date(2020, 4, 1));
        assert_eq!(inside.clamp_to(date(2020, 1, 16), date(2020, 12, 31)), inside);
    }

    #[test]
    fn test_inverted_range() {
        let range = DateRange::new(date(2020, 2, 1), date(2020, 1, 1));
        assert!(range.is_inverted());
        assert!(!range.contains(date(2020, 1, 15)));
    }

    #[test]
    fn test_summary_serializes_with_dataset_column_names() {
        let summary = PrefectureSummary {
            prefecture_name: "Tokyo".to_string(),
            prefecture_code: 13,
            infections: 30,
            infections_logarithm: 30f64.ln(),
            infections_percentage: 100.0,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["Prefecture_name"], "Tokyo");
        assert_eq!(json["Prefecture_code"], 13);
        assert_eq!(json["Infections"], 30);
        assert!(json.get("Infections_logarithm").is_some());
        assert!(json.get("Infections_Percentage").is_some());
    }

    #[test]
    fn test_display_name_fallback() {
        let feature = GeoFeature {
            id: 47,
            name_ja: None,
            geometry: Value::Null,
            properties: Map::new(),
        };
        assert_eq!(feature.display_name(), "47");
    }
}
