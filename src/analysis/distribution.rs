//! Display aggregates over normalized records.
//!
//! This module provides the counts, buckets and sort orders that the
//! dashboard, map and chart views are built from.

use crate::models::{Record, RiskLevel};
use serde::Serialize;
use std::collections::BTreeMap;

/// Width of a score histogram bucket.
const HISTOGRAM_BUCKET_WIDTH: f64 = 10.0;

/// Largest bucket index either side of zero. Out-of-range scores land in
/// the outermost bucket.
const MAX_BUCKET_INDEX: f64 = 1e15;

/// Number of records per risk bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl RiskCounts {
    pub fn add(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
        }
    }

    pub fn get(&self, level: RiskLevel) -> usize {
        match level {
            RiskLevel::Low => self.low,
            RiskLevel::Medium => self.medium,
            RiskLevel::High => self.high,
        }
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high
    }
}

/// Count records per risk bucket.
pub fn risk_distribution(records: &[Record]) -> RiskCounts {
    let mut counts = RiskCounts::default();
    for record in records {
        counts.add(record.risk_level());
    }
    counts
}

/// Risk bucket counts per municipality, ordered by municipality name.
pub fn distribution_by_municipality(records: &[Record]) -> BTreeMap<String, RiskCounts> {
    let mut grouped: BTreeMap<String, RiskCounts> = BTreeMap::new();

    for record in records {
        grouped
            .entry(record.municipality().to_string())
            .or_default()
            .add(record.risk_level());
    }

    grouped
}

/// One histogram bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreBucket {
    /// Label such as `"30-40"`.
    pub range: String,
    pub count: usize,
}

/// Histogram of scores in buckets of width 10, lowest bucket first.
pub fn score_histogram(records: &[Record]) -> Vec<ScoreBucket> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();

    for record in records {
        let index = (record.score() / HISTOGRAM_BUCKET_WIDTH)
            .floor()
            .clamp(-MAX_BUCKET_INDEX, MAX_BUCKET_INDEX) as i64;
        let lower = index * 10;
        *counts.entry(lower).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|(lower, count)| ScoreBucket {
            range: format!("{}-{}", lower, lower + 10),
            count,
        })
        .collect()
}

/// Coastal and inland record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoastalSplit {
    pub coastal: usize,
    pub inland: usize,
}

pub fn coastal_split(records: &[Record]) -> CoastalSplit {
    let coastal = records.iter().filter(|r| r.is_coastal()).count();
    CoastalSplit {
        coastal,
        inland: records.len() - coastal,
    }
}

/// The `n` highest-scoring records; ties keep input order.
pub fn top_risk<'a, I>(records: I, n: usize) -> Vec<&'a Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut sorted: Vec<&Record> = records.into_iter().collect();
    sorted.sort_by(|a, b| b.score().total_cmp(&a.score()));
    sorted.truncate(n);
    sorted
}

/// Listing filter applied before display.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub risk: Option<RiskLevel>,
    pub municipality: Option<String>,
    pub coastal_only: bool,
}

impl RecordFilter {
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(level) = self.risk {
            if record.risk_level() != level {
                return false;
            }
        }
        if let Some(ref municipality) = self.municipality {
            if !record.municipality().eq_ignore_ascii_case(municipality) {
                return false;
            }
        }
        !self.coastal_only || record.is_coastal()
    }

    pub fn apply<'a>(&self, records: &'a [Record]) -> Vec<&'a Record> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}
