//! Request/response view over the loaded tables.
//!
//! A [`Dashboard`] answers "what should the map show for this range" and
//! nothing else. [`RangeInput`] tracks the selected range and calls back
//! only when a new selection actually changes it.

use crate::analysis::{join_with_geometry, summarize, AggregateError};
use crate::loader::{parse_date, Boundaries, CaseTable};
use crate::models::{DateRange, JoinedFeature, PrefectureCode, PrefectureSummary};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, info};

/// Result of one dashboard request.
#[derive(Debug, Clone)]
pub enum View<'a> {
    /// The range contains records; draw the map.
    Map(MapView<'a>),
    /// The range contains no records; show the fallback message.
    NoData { range: DateRange, bounds: DateRange },
}

impl View<'_> {
    /// The clamped range this view was computed for.
    pub fn range(&self) -> DateRange {
        match self {
            View::Map(map) => map.range,
            View::NoData { range, .. } => *range,
        }
    }

    /// Dataset date bounds, for showing the selectable span.
    pub fn bounds(&self) -> DateRange {
        match self {
            View::Map(map) => map.bounds,
            View::NoData { bounds, .. } => *bounds,
        }
    }
}

/// Everything the renderers need to draw one map.
#[derive(Debug, Clone)]
pub struct MapView<'a> {
    pub range: DateRange,
    pub bounds: DateRange,
    pub summaries: Vec<PrefectureSummary>,
    pub boundaries: &'a Boundaries,
}

impl MapView<'_> {
    /// Boundaries joined with their summaries (inner join).
    pub fn joined(&self) -> Vec<JoinedFeature<'_>> {
        join_with_geometry(&self.summaries, self.boundaries.features())
    }

    /// Summaries keyed by prefecture code. When two names share a code the
    /// one with more infections wins.
    pub fn summaries_by_code(&self) -> HashMap<PrefectureCode, &PrefectureSummary> {
        let mut by_code = HashMap::with_capacity(self.summaries.len());
        for summary in &self.summaries {
            by_code.entry(summary.prefecture_code).or_insert(summary);
        }
        by_code
    }
}

/// Computes views from tables loaded once at startup.
#[derive(Debug, Clone, Copy)]
pub struct Dashboard<'a> {
    cases: &'a CaseTable,
    boundaries: &'a Boundaries,
}

impl<'a> Dashboard<'a> {
    pub fn new(cases: &'a CaseTable, boundaries: &'a Boundaries) -> Self {
        Self { cases, boundaries }
    }

    /// The full span of the dataset; the initial selection.
    pub fn bounds(&self) -> DateRange {
        self.cases.date_bounds()
    }

    /// Build the view for a requested range after clamping it.
    pub fn view(&self, requested: DateRange) -> View<'a> {
        let range = self.cases.clamp(requested);
        let bounds = self.bounds();

        if range != requested {
            debug!("Clamped range {} to {}", requested, range);
        }

        match summarize(self.cases.records(), range.start, range.end) {
            Ok(summaries) => {
                info!("{} prefectures with records in {}", summaries.len(), range);
                View::Map(MapView {
                    range,
                    bounds,
                    summaries,
                    boundaries: self.boundaries,
                })
            }
            Err(AggregateError::NoDataInRange { range }) => {
                info!("No records in {}", range);
                View::NoData { range, bounds }
            }
        }
    }
}

/// The selected date range, kept inside the dataset bounds.
#[derive(Debug, Clone)]
pub struct RangeInput {
    bounds: DateRange,
    current: DateRange,
}

impl RangeInput {
    /// Start with the whole dataset selected.
    pub fn new(bounds: DateRange) -> Self {
        Self {
            bounds,
            current: bounds,
        }
    }

    pub fn current(&self) -> DateRange {
        self.current
    }

    /// Apply a new selection. `None` keeps that bound as it is.
    ///
    /// The selection is clamped to the bounds; `on_change` runs only if the
    /// clamped range differs from the current one. Returns whether it ran.
    pub fn update<F>(
        &mut self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        on_change: F,
    ) -> bool
    where
        F: FnOnce(DateRange),
    {
        let requested = DateRange::new(
            start.unwrap_or(self.current.start),
            end.unwrap_or(self.current.end),
        );
        let next = requested.clamp_to(self.bounds.start, self.bounds.end);

        if next == self.current {
            return false;
        }

        self.current = next;
        on_change(next);
        true
    }
}

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeCommand {
    /// End the session.
    Quit,
    /// Nothing to do (blank line).
    Skip,
    /// Select a new range; `None` keeps the current bound.
    Select {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

/// Parse `START END`, `START`, `- END`, `q` or a blank line.
pub fn parse_range_command(line: &str) -> Result<RangeCommand, String> {
    let mut parts = line.split_whitespace();

    let first = match parts.next() {
        None => return Ok(RangeCommand::Skip),
        Some("q") | Some("quit") | Some("exit") => return Ok(RangeCommand::Quit),
        Some(first) => first,
    };
    let second = parts.next();

    if parts.next().is_some() {
        return Err("expected at most two dates".to_string());
    }

    let bound = |token: &str| -> Result<Option<NaiveDate>, String> {
        if token == "-" {
            Ok(None)
        } else {
            parse_date(token)
                .map(Some)
                .ok_or_else(|| format!("invalid date `{}`", token))
        }
    };

    Ok(RangeCommand::Select {
        start: bound(first)?,
        end: second.map(bound).transpose()?.flatten(),
    })
}
