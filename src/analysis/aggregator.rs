//! Infection aggregation.
//!
//! This module turns the raw daily case rows into per-prefecture totals
//! for a date range and pairs those totals with boundary features. All
//! functions here are pure: the same inputs always give the same output.

use crate::models::{
    CaseRecord, DateRange, GeoFeature, JoinedFeature, PrefectureCode, PrefectureSummary,
};
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

/// Conditions under which no summary can be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    /// No case record falls inside the requested range.
    #[error("no case records between {} and {}", .range.start, .range.end)]
    NoDataInRange { range: DateRange },
}

/// Natural log of a count, with 0 standing in for `ln(0)`.
pub fn infections_logarithm(infections: u64) -> f64 {
    if infections == 0 {
        0.0
    } else {
        (infections as f64).ln()
    }
}

/// Select records whose date lies within `range`, bounds included.
pub fn filter_by_range(records: &[CaseRecord], range: DateRange) -> Vec<&CaseRecord> {
    records.iter().filter(|r| range.contains(r.date)).collect()
}

/// Sum infections per prefecture over `[start_date, end_date]`.
///
/// Sums saturate at `u64::MAX`. Rows are grouped by `(name, code)`. The result is sorted by infections,
/// largest first; ties keep the order in which each group first appears in
/// `records`.
pub fn summarize(
    records: &[CaseRecord],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Vec<PrefectureSummary>, AggregateError> {
    let range = DateRange::new(start_date, end_date);
    let filtered = filter_by_range(records, range);

    if filtered.is_empty() {
        return Err(AggregateError::NoDataInRange { range });
    }

    let mut index: HashMap<(&str, PrefectureCode), usize> = HashMap::new();
    let mut groups: Vec<(&str, PrefectureCode, u64)> = Vec::new();

    for record in filtered {
        let key = (record.prefecture_name.as_str(), record.prefecture_code);
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push((key.0, key.1, 0));
            groups.len() - 1
        });
        groups[slot].2 = groups[slot].2.saturating_add(record.infections);
    }

    let total = groups
        .iter()
        .fold(0u64, |acc, (_, _, sum)| acc.saturating_add(*sum));

    let mut summaries: Vec<PrefectureSummary> = groups
        .into_iter()
        .map(|(name, code, infections)| PrefectureSummary {
            prefecture_name: name.to_string(),
            prefecture_code: code,
            infections,
            infections_logarithm: infections_logarithm(infections),
            infections_percentage: percentage(infections, total),
        })
        .collect();

    // sort_by is stable, so equal counts keep first-appearance order
    summaries.sort_by(|a, b| b.infections.cmp(&a.infections));

    Ok(summaries)
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

/// Pair each boundary with the summaries sharing its prefecture code.
///
/// This is an inner join: boundaries without a summary are left out.
/// Output follows the boundary order.
pub fn join_with_geometry<'a>(
    summaries: &'a [PrefectureSummary],
    features: &'a [GeoFeature],
) -> Vec<JoinedFeature<'a>> {
    let mut by_code: HashMap<PrefectureCode, Vec<&PrefectureSummary>> = HashMap::new();
    for summary in summaries {
        by_code
            .entry(summary.prefecture_code)
            .or_default()
            .push(summary);
    }

    features
        .iter()
        .flat_map(|feature| {
            by_code
                .get(&feature.id)
                .into_iter()
                .flatten()
                .map(move |summary| JoinedFeature {
                    feature,
                    summary: *summary,
                })
        })
        .collect()
}

/// Boundaries that have no summary in the current result.
pub fn unmatched_features<'a>(
    summaries: &[PrefectureSummary],
    features: &'a [GeoFeature],
) -> Vec<&'a GeoFeature> {
    features
        .iter()
        .filter(|f| !summaries.iter().any(|s| s.prefecture_code == f.id))
        .collect()
}

/// Sum of infections across all summaries.
pub fn total_infections(summaries: &[PrefectureSummary]) -> u64 {
    summaries
        .iter()
        .fold(0u64, |acc, s| acc.saturating_add(s.infections))
}

/// Smallest and largest logarithm value, or `None` for an empty slice.
pub fn logarithm_range(summaries: &[PrefectureSummary]) -> Option<(f64, f64)> {
    summaries.iter().map(|s| s.infections_logarithm).fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// The `n` prefectures with the most infections.
pub fn top_prefectures(summaries: &[PrefectureSummary], n: usize) -> &[PrefectureSummary] {
    &summaries[..n.min(summaries.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn scenario_records() -> Vec<CaseRecord> {
        vec![
            CaseRecord::new(date(2020, 1, 1), "Tokyo", 13, 10),
            CaseRecord::new(date(2020, 1, 2), "Tokyo", 13, 20),
            CaseRecord::new(date(2020, 1, 1), "Osaka", 27, 0),
        ]
    }

    fn create_test_feature(id: PrefectureCode, name: &str) -> GeoFeature {
        let mut properties = Map::new();
        properties.insert("id".to_string(), Value::from(id));
        properties.insert("nam_ja".to_string(), Value::from(name));
        GeoFeature {
            id,
            name_ja: Some(name.to_string()),
            geometry: Value::Null,
            properties,
        }
    }

    #[test]
    fn test_summarize_scenario() {
        let summaries =
            summarize(&scenario_records(), date(2020, 1, 1), date(2020, 1, 2)).unwrap();

        assert_eq!(summaries.len(), 2);

        assert_eq!(summaries[0].prefecture_name, "Tokyo");
        assert_eq!(summaries[0].prefecture_code, 13);
        assert_eq!(summaries[0].infections, 30);
        assert!((summaries[0].infections_logarithm - 30f64.ln()).abs() < 1e-12);
        assert!((summaries[0].infections_percentage - 100.0).abs() < 1e-9);

        assert_eq!(summaries[1].prefecture_name, "Osaka");
        assert_eq!(summaries[1].prefecture_code, 27);
        assert_eq!(summaries[1].infections, 0);
        assert_eq!(summaries[1].infections_logarithm, 0.0);
        assert_eq!(summaries[1].infections_percentage, 0.0);
    }

    #[test]
    fn test_summarize_no_data() {
        let err = summarize(&scenario_records(), date(2021, 1, 1), date(2021, 12, 31))
            .unwrap_err();
        assert_eq!(
            err,
            AggregateError::NoDataInRange {
                range: DateRange::new(date(2021, 1, 1), date(2021, 12, 31))
            }
        );
    }

    #[test]
    fn test_summarize_inverted_range_has_no_data() {
        let result = summarize(&scenario_records(), date(2020, 1, 2), date(2020, 1, 1));
        assert!(result.is_err());
    }

    #[test]
    fn test_filtering_is_inclusive() {
        let records = vec![
            CaseRecord::new(date(2020, 1, 31), "Tokyo", 13, 1),
            CaseRecord::new(date(2020, 2, 1), "Tokyo", 13, 10),
            CaseRecord::new(date(2020, 2, 29), "Tokyo", 13, 100),
            CaseRecord::new(date(2020, 3, 1), "Tokyo", 13, 1000),
        ];

        let summaries = summarize(&records, date(2020, 2, 1), date(2020, 2, 29)).unwrap();
        assert_eq!(summaries[0].infections, 110);
    }

    #[test]
    fn test_percentages_sum_to_100() {
        let records = vec![
            CaseRecord::new(date(2020, 4, 1), "Tokyo", 13, 7),
            CaseRecord::new(date(2020, 4, 1), "Osaka", 27, 3),
            CaseRecord::new(date(2020, 4, 1), "Hokkaido", 1, 11),
            CaseRecord::new(date(2020, 4, 2), "Fukuoka", 40, 13),
            CaseRecord::new(date(2020, 4, 2), "Tokyo", 13, 17),
        ];

        let summaries = summarize(&records, date(2020, 4, 1), date(2020, 4, 2)).unwrap();
        let sum: f64 = summaries.iter().map(|s| s.infections_percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_zero_counts_give_zero_percentages() {
        let records = vec![
            CaseRecord::new(date(2020, 1, 1), "Tokyo", 13, 0),
            CaseRecord::new(date(2020, 1, 1), "Osaka", 27, 0),
        ];

        let summaries = summarize(&records, date(2020, 1, 1), date(2020, 1, 1)).unwrap();
        assert!(summaries
            .iter()
            .all(|s| s.infections_percentage == 0.0 && s.infections_logarithm == 0.0));
    }

    #[test]
    fn test_logarithm_policy() {
        assert_eq!(infections_logarithm(0), 0.0);
        assert_eq!(infections_logarithm(1), 0.0);
        assert!((infections_logarithm(100) - 100f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_ties_keep_first_appearance_order() {
        let records = vec![
            CaseRecord::new(date(2020, 1, 1), "Osaka", 27, 5),
            CaseRecord::new(date(2020, 1, 1), "Aichi", 23, 5),
            CaseRecord::new(date(2020, 1, 1), "Tokyo", 13, 9),
        ];

        let summaries = summarize(&records, date(2020, 1, 1), date(2020, 1, 1)).unwrap();
        let names: Vec<_> = summaries.iter().map(|s| s.prefecture_name.as_str()).collect();
        assert_eq!(names, vec!["Tokyo", "Osaka", "Aichi"]);
    }

    #[test]
    fn test_groups_by_name_and_code() {
        let records = vec![
            CaseRecord::new(date(2020, 1, 1), "Tokyo", 13, 1),
            CaseRecord::new(date(2020, 1, 1), "東京都", 13, 2),
        ];

        let summaries = summarize(&records, date(2020, 1, 1), date(2020, 1, 1)).unwrap();
        assert_eq!(summaries.len(), 2);
    }

    #[test]
    fn test_summarize_is_idempotent() {
        let records = scenario_records();
        let first = summarize(&records, date(2020, 1, 1), date(2020, 1, 2));
        let second = summarize(&records, date(2020, 1, 1), date(2020, 1, 2));
        assert_eq!(first, second);
    }

    #[test]
    fn test_join_drops_unmatched_geometry() {
        let summaries =
            summarize(&scenario_records(), date(2020, 1, 1), date(2020, 1, 2)).unwrap();
        let features = vec![
            create_test_feature(27, "大阪府"),
            create_test_feature(47, "沖縄県"),
            create_test_feature(13, "東京都"),
        ];

        let joined = join_with_geometry(&summaries, &features);

        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].feature.id, 27);
        assert_eq!(joined[0].summary.prefecture_name, "Osaka");
        assert_eq!(joined[1].feature.id, 13);
        assert_eq!(joined[1].summary.infections, 30);
        assert!(joined.iter().all(|j| j.feature.id != 47));

        let unmatched = unmatched_features(&summaries, &features);
        assert_eq!(unmatched.len(), 1);
        assert_eq!(unmatched[0].id, 47);
    }

    #[test]
    fn test_join_with_no_common_codes() {
        let summaries =
            summarize(&scenario_records(), date(2020, 1, 1), date(2020, 1, 2)).unwrap();
        let features = vec![create_test_feature(1, "北海道")];
        assert!(join_with_geometry(&summaries, &features).is_empty());
    }

    #[test]
    fn test_statistics_helpers() {
        let summaries =
            summarize(&scenario_records(), date(2020, 1, 1), date(2020, 1, 2)).unwrap();

        assert_eq!(total_infections(&summaries), 30);

        let (lo, hi) = logarithm_range(&summaries).unwrap();
        assert_eq!(lo, 0.0);
        assert!((hi - 30f64.ln()).abs() < 1e-12);
        assert_eq!(logarithm_range(&[]), None);

        assert_eq!(top_prefectures(&summaries, 1).len(), 1);
        assert_eq!(top_prefectures(&summaries, 10).len(), 2);
    }

    #[test]
    fn test_huge_counts_saturate() {
        let csv = "Date,Prefecture_name,Prefecture_code,Infections\n\
                   2020-01-01,Tokyo,13,9223372036854775807\n\
                   2020-01-02,Tokyo,13,9223372036854775807\n\
                   2020-01-03,Tokyo,13,9223372036854775807\n\
                   2020-01-03,Osaka,27,9223372036854775807\n";
        let table = crate::loader::CaseTable::from_reader(csv.as_bytes()).unwrap();

        let summaries = summarize(table.records(), date(2020, 1, 1), date(2020, 1, 3)).unwrap();

        assert_eq!(summaries[0].prefecture_name, "Tokyo");
        assert_eq!(summaries[0].infections, u64::MAX);
        assert!(summaries[0].infections_logarithm.is_finite());
        assert!(summaries
            .iter()
            .all(|s| s.infections_percentage.is_finite() && s.infections_percentage <= 100.0));
        assert_eq!(total_infections(&summaries), u64::MAX);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        const NAMES: [&str; 5] = ["Hokkaido", "Tokyo", "Aichi", "Osaka", "Fukuoka"];

        fn day(offset: i64) -> NaiveDate {
            date(2020, 1, 1) + chrono::Duration::days(offset)
        }

        fn arb_record() -> impl Strategy<Value = CaseRecord> {
            (0i64..60, 0usize..NAMES.len(), 0u64..10_000)
                .prop_map(|(offset, i, count)| {
                    CaseRecord::new(day(offset), NAMES[i], i as PrefectureCode + 1, count)
                })
        }

        fn arb_records() -> impl Strategy<Value = Vec<CaseRecord>> {
            prop::collection::vec(arb_record(), 0..80)
        }

        proptest! {
            #[test]
            fn percentages_sum_to_100(
                records in arb_records(),
                start in 0i64..60,
                end in 0i64..60
            ) {
                if let Ok(summaries) = summarize(&records, day(start), day(end)) {
                    let sum: f64 = summaries.iter().map(|s| s.infections_percentage).sum();
                    if total_infections(&summaries) > 0 {
                        prop_assert!((sum - 100.0).abs() < 1e-6);
                    } else {
                        prop_assert_eq!(sum, 0.0);
                    }
                }
            }

            #[test]
            fn logarithm_is_ln_or_zero(
                records in arb_records(),
                start in 0i64..60,
                end in 0i64..60
            ) {
                if let Ok(summaries) = summarize(&records, day(start), day(end)) {
                    for s in &summaries {
                        if s.infections == 0 {
                            prop_assert_eq!(s.infections_logarithm, 0.0);
                        } else {
                            prop_assert_eq!(s.infections_logarithm, (s.infections as f64).ln());
                        }
                    }
                }
            }

            #[test]
            fn bounds_are_inclusive(
                records in arb_records(),
                start in 0i64..60,
                end in 0i64..60
            ) {
                let (start, end) = (day(start), day(end));
                let in_range: Vec<&CaseRecord> = records
                    .iter()
                    .filter(|r| start <= r.date && r.date <= end)
                    .collect();

                match summarize(&records, start, end) {
                    Ok(summaries) => {
                        let expected: u64 = in_range.iter().map(|r| r.infections).sum();
                        prop_assert_eq!(total_infections(&summaries), expected);
                        for s in &summaries {
                            let own: u64 = in_range
                                .iter()
                                .filter(|r| r.prefecture_code == s.prefecture_code)
                                .map(|r| r.infections)
                                .sum();
                            prop_assert_eq!(s.infections, own);
                        }
                    }
                    Err(AggregateError::NoDataInRange { .. }) => {
                        prop_assert!(in_range.is_empty());
                    }
                }
            }

            #[test]
            fn summarize_is_idempotent(
                records in arb_records(),
                start in 0i64..60,
                end in 0i64..60
            ) {
                let first = summarize(&records, day(start), day(end));
                let second = summarize(&records, day(start), day(end));
                prop_assert_eq!(&first, &second);

                let filtered: Vec<CaseRecord> = records
                    .iter()
                    .filter(|r| DateRange::new(day(start), day(end)).contains(r.date))
                    .cloned()
                    .collect();
                prop_assert_eq!(first, summarize(&filtered, day(start), day(end)));
            }
        }
    }
}
