//! Reference (blank, air, cocktail) lookups around a set of unknowns

use chrono::{DateTime, Duration, Utc};
use fnv::FnvHashSet;

use super::{AnalysisQuery, AnalysisSource, Order, StoreError};
use crate::analysis::AnalysisRecord;
use crate::binning::{bin_intervals, compress_times, pad_after, pad_before};

// saturates at the longest representable duration
pub(crate) fn hours_to_duration(hours: f64) -> Result<Duration, StoreError> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(StoreError::InvalidHours(hours));
    }
    Ok(Duration::try_milliseconds((hours * 3_600_000.0).round() as i64).unwrap_or(Duration::MAX))
}

// records without a uuid fall back to their catalog id
fn dedup_key(record: &AnalysisRecord) -> String {
    if record.uuid.is_empty() {
        format!("#{}", record.id)
    } else {
        record.uuid.clone()
    }
}

/// References measured within `hours` of any of `times`
///
/// The padded windows around `times` are merged first, then each window is
/// queried with the filters of `base` (its date range is replaced). Records
/// are de-duplicated by uuid, keeping the first one seen.
pub fn find_references<S: AnalysisSource + ?Sized>(
    source: &S,
    times: &[DateTime<Utc>],
    hours: f64,
    base: &AnalysisQuery,
) -> Result<Vec<AnalysisRecord>, StoreError> {
    let windows = compress_times(times, hours_to_duration(hours)?);
    tracing::debug!(
        "find references ntimes={} compresstimes={}",
        times.len(),
        windows.len()
    );

    let mut seen: FnvHashSet<String> = FnvHashSet::default();
    let mut references = Vec::new();
    for (low, high) in windows {
        for record in source.analyses(&base.clone().date_range(low, high))? {
            if seen.insert(dedup_key(&record)) {
                references.push(record);
            }
        }
    }
    Ok(references)
}

/// Most recent `n` analyses matching `base`, newest first
pub fn last_n_analyses<S: AnalysisSource + ?Sized>(
    source: &S,
    n: usize,
    base: &AnalysisQuery,
) -> Result<Vec<AnalysisRecord>, StoreError> {
    source.analyses(&base.clone().order(Order::Descending).limit(n))
}

/// Analyses from the `hours` before `now`, oldest first
pub fn last_nhours_analyses<S: AnalysisSource + ?Sized>(
    source: &S,
    now: DateTime<Utc>,
    hours: f64,
    base: &AnalysisQuery,
) -> Result<Vec<AnalysisRecord>, StoreError> {
    let low = pad_before(now, hours_to_duration(hours)?);
    tracing::debug!("last nhours n={} low={}", hours, low);
    source.analyses(&base.clone().date_range(low, now).order(Order::Ascending))
}

/// Earliest and latest run time of `identifiers`, widened by `delta_hours`
///
/// `None` when no analysis matches.
pub fn min_max_timestamp<S: AnalysisSource + ?Sized>(
    source: &S,
    identifiers: &[String],
    delta_hours: f64,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, StoreError> {
    let delta = hours_to_duration(delta_hours)?;
    let records = source.analyses(
        &AnalysisQuery::new()
            .identifiers(identifiers)
            .order(Order::Ascending),
    )?;

    Ok(match (records.first(), records.last()) {
        (Some(first), Some(last)) => Some((
            pad_before(first.timestamp, delta),
            pad_after(last.timestamp, delta),
        )),
        _ => None,
    })
}

/// Run-time clusters of `identifiers`, split where consecutive runs are more
/// than `hours` apart
pub fn analysis_date_ranges<S: AnalysisSource + ?Sized>(
    source: &S,
    identifiers: &[String],
    hours: f64,
) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, StoreError> {
    hours_to_duration(hours)?;
    let records = source.analyses(
        &AnalysisQuery::new()
            .identifiers(identifiers)
            .order(Order::Ascending),
    )?;

    let timestamps: Vec<f64> = records.iter().map(AnalysisRecord::timestamp_secs).collect();
    let bins = bin_intervals(&timestamps, hours).map_err(|_| StoreError::InvalidHours(hours))?;
    Ok(bins
        .iter()
        .map(|bin| {
            (
                records[bin.start].timestamp,
                records[bin.start + bin.len - 1].timestamp,
            )
        })
        .collect())
}
