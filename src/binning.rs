//! Time-window binning of analyses
//!
//! Sorted run timestamps (seconds) are chained into bins: a timestamp joins the
//! current bin when it is within the tolerance of the previous timestamp,
//! otherwise it starts a new bin. Bin summaries use Trueno vectors.

use aprender::stats::DescriptiveStats;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::AnalysisRecord;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Errors for malformed binning input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BinningError {
    #[error("Tolerance must be a finite, non-negative number of hours, got {0}")]
    InvalidTolerance(f64),

    #[error("Timestamp at index {index} is not finite")]
    NonFinite { index: usize },

    #[error("Timestamps must be sorted ascending: index {index} is earlier than its predecessor")]
    Unsorted { index: usize },
}

/// A contiguous run of timestamps merged into one bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBin {
    /// First timestamp in the bin (seconds)
    pub low: f64,
    /// Last timestamp in the bin (seconds)
    pub high: f64,
    /// Index of the first member in the sorted input
    pub start: usize,
    /// Number of members
    pub len: usize,
}

impl TimeBin {
    pub fn span_hours(&self) -> f64 {
        (self.high - self.low) / SECONDS_PER_HOUR
    }

    pub fn contains_index(&self, index: usize) -> bool {
        (self.start..self.start + self.len).contains(&index)
    }
}

fn validate(timestamps: &[f64], tol_hrs: f64) -> Result<f64, BinningError> {
    if !tol_hrs.is_finite() || tol_hrs < 0.0 {
        return Err(BinningError::InvalidTolerance(tol_hrs));
    }
    for (index, ts) in timestamps.iter().enumerate() {
        if !ts.is_finite() {
            return Err(BinningError::NonFinite { index });
        }
        if index > 0 && *ts < timestamps[index - 1] {
            return Err(BinningError::Unsorted { index });
        }
    }
    Ok(tol_hrs * SECONDS_PER_HOUR)
}

/// Split points of a sorted timestamp sequence
///
/// Each returned index `i` means a new bin starts at `i + 1`. An empty result
/// means everything falls into one bin.
pub fn bin_timestamps(timestamps: &[f64], tol_hrs: f64) -> Result<Vec<usize>, BinningError> {
    let tol = validate(timestamps, tol_hrs)?;
    Ok(timestamps
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[1] - pair[0] > tol)
        .map(|(i, _)| i)
        .collect())
}

/// Bin index of every timestamp
pub fn bin_ids(timestamps: &[f64], tol_hrs: f64) -> Result<Vec<usize>, BinningError> {
    let splits = bin_timestamps(timestamps, tol_hrs)?;
    let mut ids = Vec::with_capacity(timestamps.len());
    let mut current = 0;
    let mut next_split = splits.iter().peekable();
    for i in 0..timestamps.len() {
        ids.push(current);
        if next_split.peek() == Some(&&i) {
            next_split.next();
            current += 1;
        }
    }
    Ok(ids)
}

/// Interval boundaries of every bin
pub fn bin_intervals(timestamps: &[f64], tol_hrs: f64) -> Result<Vec<TimeBin>, BinningError> {
    let splits = bin_timestamps(timestamps, tol_hrs)?;
    if timestamps.is_empty() {
        return Ok(Vec::new());
    }

    let mut bins = Vec::with_capacity(splits.len() + 1);
    let mut start = 0;
    for end in splits.into_iter().chain(std::iter::once(timestamps.len() - 1)) {
        bins.push(TimeBin {
            low: timestamps[start],
            high: timestamps[end],
            start,
            len: end + 1 - start,
        });
        start = end + 1;
    }
    Ok(bins)
}

/// `t - padding`, clamped to the earliest representable time
pub fn pad_before(t: DateTime<Utc>, padding: Duration) -> DateTime<Utc> {
    t.checked_sub_signed(padding).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// `t + padding`, clamped to the latest representable time
pub fn pad_after(t: DateTime<Utc>, padding: Duration) -> DateTime<Utc> {
    t.checked_add_signed(padding).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Merge `[t - padding, t + padding]` windows around each time
///
/// Input need not be sorted. Overlapping or touching windows merge into one.
/// Windows reaching past the representable range are clamped to it.
pub fn compress_times(
    times: &[DateTime<Utc>],
    padding: Duration,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut sorted = times.to_vec();
    sorted.sort();

    let mut windows: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    for t in sorted {
        let (low, high) = (pad_before(t, padding), pad_after(t, padding));
        match windows.last_mut() {
            Some(last) if low <= last.1 => last.1 = last.1.max(high),
            _ => windows.push((low, high)),
        }
    }
    windows
}

/// Pipeline node assigning `group_id` by run-time bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinNode {
    #[serde(default = "default_tolerance")]
    pub tolerance_hours: f64,
}

fn default_tolerance() -> f64 {
    1.0
}

impl Default for BinNode {
    fn default() -> Self {
        Self {
            tolerance_hours: default_tolerance(),
        }
    }
}

impl BinNode {
    pub fn new(tolerance_hours: f64) -> Self {
        Self { tolerance_hours }
    }

    /// Set each record's `group_id` to its bin in timestamp order
    ///
    /// The slice keeps its order; bins are returned in time order with
    /// `start` indexing the time-sorted sequence.
    pub fn run(&self, records: &mut [AnalysisRecord]) -> Result<Vec<TimeBin>, BinningError> {
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by_key(|&i| records[i].timestamp);

        let timestamps: Vec<f64> = order.iter().map(|&i| records[i].timestamp_secs()).collect();
        let ids = bin_ids(&timestamps, self.tolerance_hours)?;
        for (&i, id) in order.iter().zip(ids) {
            records[i].group_id = id;
        }

        let bins = bin_intervals(&timestamps, self.tolerance_hours)?;
        tracing::debug!(
            "binned {} analyses into {} bins (tolerance {}h)",
            records.len(),
            bins.len(),
            self.tolerance_hours
        );
        Ok(bins)
    }
}

/// Descriptive statistics of a set of durations (hours)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub mean: f32,
    pub stddev: f32,
    pub min: f32,
    pub max: f32,
    pub median: f32,
}

/// Summary of a binning result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSummary {
    pub bins: usize,
    pub analyses: usize,
    /// Bin spans (first to last member)
    pub span_hours: Option<DurationStats>,
    /// Gaps between consecutive bins
    pub gap_hours: Option<DurationStats>,
}

impl BinSummary {
    pub fn from_bins(bins: &[TimeBin]) -> Self {
        let spans: Vec<f32> = bins.iter().map(|b| b.span_hours() as f32).collect();
        let gaps: Vec<f32> = bins
            .windows(2)
            .map(|pair| ((pair[1].low - pair[0].high) / SECONDS_PER_HOUR) as f32)
            .collect();

        Self {
            bins: bins.len(),
            analyses: bins.iter().map(|b| b.len).sum(),
            span_hours: duration_stats(&spans),
            gap_hours: duration_stats(&gaps),
        }
    }
}

fn duration_stats(values: &[f32]) -> Option<DurationStats> {
    if values.is_empty() {
        return None;
    }

    let v = trueno::Vector::from_slice(values);
    let median = DescriptiveStats::new(&v).quantile(0.5).unwrap_or(0.0);

    Some(DurationStats {
        mean: v.mean().unwrap_or(0.0),
        stddev: v.stddev().unwrap_or(0.0),
        min: v.min().unwrap_or(0.0),
        max: v.max().unwrap_or(0.0),
        median,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hours(values: &[f64]) -> Vec<f64> {
        values.iter().map(|h| h * SECONDS_PER_HOUR).collect()
    }

    #[test]
    fn test_two_bins_example() {
        let ts = hours(&[0.0, 1.0, 20.0]);
        assert_eq!(bin_timestamps(&ts, 2.0).unwrap(), vec![1]);
        assert_eq!(bin_ids(&ts, 2.0).unwrap(), vec![0, 0, 1]);

        let bins = bin_intervals(&ts, 2.0).unwrap();
        assert_eq!(bins.len(), 2);
        assert_eq!((bins[0].start, bins[0].len), (0, 2));
        assert_eq!((bins[1].start, bins[1].len), (2, 1));
        assert_eq!(bins[0].span_hours(), 1.0);
    }

    #[test]
    fn test_chained_timestamps_share_bin() {
        // each step is within tolerance of the previous one
        let ts = hours(&[0.0, 0.9, 1.8, 2.7]);
        assert_eq!(bin_ids(&ts, 1.0).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_gap_equal_to_tolerance_stays() {
        let ts = hours(&[0.0, 1.0]);
        assert!(bin_timestamps(&ts, 1.0).unwrap().is_empty());
    }

    #[test]
    fn test_zero_tolerance_splits_distinct() {
        let ts = hours(&[0.0, 0.0, 1.0]);
        assert_eq!(bin_ids(&ts, 0.0).unwrap(), vec![0, 0, 1]);
    }

    #[test]
    fn test_empty_and_single() {
        assert!(bin_ids(&[], 1.0).unwrap().is_empty());
        assert!(bin_intervals(&[], 1.0).unwrap().is_empty());
        assert_eq!(bin_ids(&[5.0], 1.0).unwrap(), vec![0]);
    }

    #[test]
    fn test_invalid_input() {
        assert_eq!(
            bin_timestamps(&[0.0], -1.0),
            Err(BinningError::InvalidTolerance(-1.0))
        );
        assert_eq!(
            bin_timestamps(&[0.0, f64::NAN], 1.0),
            Err(BinningError::NonFinite { index: 1 })
        );
        assert_eq!(
            bin_timestamps(&[10.0, 5.0], 1.0),
            Err(BinningError::Unsorted { index: 1 })
        );
    }

    #[test]
    fn test_compress_times_merges_overlaps() {
        let t = |h: i64| Utc.timestamp_opt(h * 3600, 0).unwrap();
        let windows = compress_times(&[t(10), t(0), t(1)], Duration::hours(2));
        assert_eq!(windows, vec![(t(-2), t(3)), (t(8), t(12))]);
    }

    #[test]
    fn test_compress_times_clamps_huge_padding() {
        let t = |h: i64| Utc.timestamp_opt(h * 3600, 0).unwrap();
        let windows = compress_times(&[t(0), t(500)], Duration::MAX);
        assert_eq!(
            windows,
            vec![(DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)]
        );
    }

    #[test]
    fn test_bin_node_assigns_group_ids_without_reordering() {
        let t = |h: i64| Utc.timestamp_opt(1_700_000_000 + h * 3600, 0).unwrap();
        let mut records = vec![
            AnalysisRecord::new("A", 1, t(30)),
            AnalysisRecord::new("A", 2, t(0)),
            AnalysisRecord::new("A", 3, t(1)),
        ];

        let bins = BinNode::new(1.0).run(&mut records).unwrap();
        assert_eq!(bins.len(), 2);
        assert_eq!(records[0].aliquot, 1);
        let ids: Vec<usize> = records.iter().map(|r| r.group_id).collect();
        assert_eq!(ids, vec![1, 0, 0]);
    }

    #[test]
    fn test_bin_node_single_bin() {
        let t = |h: i64| Utc.timestamp_opt(h * 3600, 0).unwrap();
        let mut records = vec![AnalysisRecord::new("A", 1, t(0)), AnalysisRecord::new("A", 2, t(0))];
        records[1].group_id = 3;
        BinNode::default().run(&mut records).unwrap();
        assert!(records.iter().all(|r| r.group_id == 0));
    }

    #[test]
    fn test_bin_summary() {
        let ts = hours(&[0.0, 2.0, 10.0, 30.0, 34.0]);
        let bins = bin_intervals(&ts, 4.0).unwrap();
        let summary = BinSummary::from_bins(&bins);

        assert_eq!(summary.bins, 3);
        assert_eq!(summary.analyses, 5);
        let spans = summary.span_hours.unwrap();
        assert!((spans.max - 4.0).abs() < 1e-4);
        assert!((spans.min - 0.0).abs() < 1e-4);
        let gaps = summary.gap_hours.unwrap();
        assert!((gaps.min - 8.0).abs() < 1e-4);
        assert!((gaps.max - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_bin_summary_single_bin_has_no_gaps() {
        let bins = bin_intervals(&hours(&[0.0, 0.5]), 1.0).unwrap();
        let summary = BinSummary::from_bins(&bins);
        assert!(summary.gap_hours.is_none());
        assert!(summary.span_hours.is_some());
    }
}
