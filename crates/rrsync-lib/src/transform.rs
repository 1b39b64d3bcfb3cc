//! Stateless operations producing new series from old ones.

use crate::error::{Error, Result};
use crate::metrics::stats::outlier_bounds;
use crate::series::{cumulative_sum, millis_between, Series, SeriesPair};
use crate::table::SeriesTable;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters of the two-stage outlier filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Global stage: values further than this many standard deviations from the mean.
    pub sd_threshold: f64,
    /// Local stage: allowed relative deviation from the mean of both neighbours.
    pub threshold_factor: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            sd_threshold: 3.0,
            threshold_factor: 0.2,
        }
    }
}

/// Tightest window covered by every non-empty series: (max of starts, min of ends).
pub fn common_window<'a, I>(series: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = &'a Series>,
{
    series
        .into_iter()
        .filter_map(|s| Some((s.first_time()?, s.last_time()?)))
        .reduce(|(lo, hi), (first, last)| (lo.max(first), hi.min(last)))
}

/// Keep samples whose time lies in `[start, end]` (inclusive). Missing bounds default
/// to the series' own first/last sample.
pub fn trim(series: &Series, start: Option<f64>, end: Option<f64>) -> Series {
    let lo = start.or(series.first_time()).unwrap_or(0.0);
    let hi = end.or(series.last_time()).unwrap_or(0.0);
    trim_to(series, lo, hi)
}

/// Trim both sides; missing bounds default to the pair's common overlap.
pub fn trim_pair(pair: &SeriesPair, start: Option<f64>, end: Option<f64>) -> SeriesPair {
    let (lo, hi) = resolve_window(pair.iter(), start, end);
    SeriesPair::new(trim_to(&pair.a, lo, hi), trim_to(&pair.b, lo, hi))
}

/// Trim every entry; missing bounds default to the tightest common overlap.
pub fn trim_table(table: &SeriesTable, start: Option<f64>, end: Option<f64>) -> SeriesTable {
    let (lo, hi) = resolve_window(table.values(), start, end);
    table.values().map(|s| trim_to(s, lo, hi)).collect()
}

fn resolve_window<'a, I>(series: I, start: Option<f64>, end: Option<f64>) -> (f64, f64)
where
    I: IntoIterator<Item = &'a Series>,
{
    let window = common_window(series);
    let lo = start.or(window.map(|w| w.0)).unwrap_or(0.0);
    let hi = end.or(window.map(|w| w.1)).unwrap_or(0.0);
    (lo, hi)
}

fn trim_to(series: &Series, lo: f64, hi: f64) -> Series {
    let (time, interval): (Vec<f64>, Vec<f64>) = series
        .time()
        .iter()
        .zip(series.interval())
        .filter(|(t, _)| **t >= lo && **t <= hi)
        .map(|(t, v)| (*t, *v))
        .unzip();
    let (start, end) = match (time.first(), time.last()) {
        (Some(&first), Some(&last)) => (series.timestamp_at(first), series.timestamp_at(last)),
        _ => {
            warn!(
                "trim: no samples of {} within [{lo}, {hi}]; timing taken from the window bounds",
                series.key()
            );
            (series.timestamp_at(lo), series.timestamp_at(hi))
        }
    };
    series.with_samples(time, interval).with_bounds(start, end)
}

/// Move every sample `shift_ms` later on the time axis. The shift accumulates into
/// [`Series::shift_ms`], which also changes the table key.
pub fn shift(series: &Series, shift_ms: i64) -> Series {
    let offset = shift_ms as f64;
    let time = series.time().iter().map(|t| t + offset).collect();
    series
        .with_samples(time, series.interval().to_vec())
        .with_shift(series.shift_ms() + shift_ms)
}

pub fn shift_pair(pair: &SeriesPair, shift_ms: i64) -> SeriesPair {
    SeriesPair::new(shift(&pair.a, shift_ms), shift(&pair.b, shift_ms))
}

/// Join the pieces of recordings that share a name into one series per name.
///
/// Pieces are ordered by start time and placed on the clock of the earliest one, so
/// the real pause between them stays visible as a gap on the time axis.
pub fn merge(table: &SeriesTable) -> SeriesTable {
    let mut groups: BTreeMap<&str, Vec<&Series>> = BTreeMap::new();
    for s in table.values() {
        groups.entry(s.name()).or_default().push(s);
    }

    let mut merged = SeriesTable::new();
    for (name, mut group) in groups {
        if group.len() == 1 {
            merged.insert(group[0].clone());
            continue;
        }
        group.sort_by_key(|s| s.start_time());
        let first = group[0];
        let mut time = Vec::new();
        let mut interval = Vec::new();
        for piece in &group {
            let offset = millis_between(first.origin(), piece.origin());
            time.extend(piece.time().iter().map(|t| t + offset));
            interval.extend_from_slice(piece.interval());
        }
        if time.windows(2).any(|w| w[1] <= w[0]) {
            warn!("merge: pieces of {name} overlap in time; merged axis is not increasing");
        }
        let start = group.iter().map(|s| s.start_time()).min().unwrap_or(first.start_time());
        let end = group.iter().map(|s| s.end_time()).max().unwrap_or(first.end_time());
        merged.insert(first.with_samples(time, interval).with_bounds(start, end));
    }
    merged
}

/// Global stage: mark values outside `mean ± sd_threshold·sd` as NaN.
pub fn filter_outliers_sd(interval: &[f64], sd_threshold: f64) -> Vec<f64> {
    let Some((low, high)) = outlier_bounds(interval, sd_threshold) else {
        return interval.to_vec();
    };
    interval
        .iter()
        .map(|&x| if x < low || x > high { f64::NAN } else { x })
        .collect()
}

/// Local stage: mark interior values deviating from the mean of both neighbours by more
/// than `threshold_factor` as NaN. Neighbours are read from the input, and a value with
/// a missing neighbour is left alone. The first and last values are never touched.
pub fn filter_outliers_relative(interval: &[f64], threshold_factor: f64) -> Vec<f64> {
    let mut out = interval.to_vec();
    for i in 1..interval.len().saturating_sub(1) {
        let (prev, next) = (interval[i - 1], interval[i + 1]);
        if prev.is_nan() || next.is_nan() {
            continue;
        }
        let m = (prev + next) / 2.0;
        let x = interval[i];
        if x > (1.0 + threshold_factor) * m || x < (1.0 - threshold_factor) * m {
            out[i] = f64::NAN;
        }
    }
    out
}

/// Fill NaN gaps by linear interpolation over the sample index. Leading and trailing
/// runs take the nearest valid value. With no valid value at all, nothing changes.
pub fn interpolate_nan(interval: &[f64]) -> Vec<f64> {
    let anchors: Vec<usize> = (0..interval.len())
        .filter(|&i| !interval[i].is_nan())
        .collect();
    if anchors.is_empty() {
        return interval.to_vec();
    }
    let mut out = interval.to_vec();
    let mut next_anchor = 0;
    for i in 0..interval.len() {
        while next_anchor < anchors.len() && anchors[next_anchor] < i {
            next_anchor += 1;
        }
        if !interval[i].is_nan() {
            continue;
        }
        let left = next_anchor.checked_sub(1).map(|k| anchors[k]);
        let right = anchors.get(next_anchor).copied();
        out[i] = match (left, right) {
            (Some(l), Some(r)) => {
                let frac = (i - l) as f64 / (r - l) as f64;
                interval[l] + (interval[r] - interval[l]) * frac
            }
            (Some(l), None) => interval[l],
            (None, Some(r)) => interval[r],
            (None, None) => f64::NAN,
        };
    }
    out
}

/// Outlier removal plus gap filling, turning RR into NN intervals.
///
/// The time axis is rebuilt as the running sum of the filled intervals, so the series
/// must be contiguous: merge first, and do not apply this to gap-split pieces.
pub fn filter_series(series: &Series, config: &FilterConfig) -> Result<Series> {
    let marked = filter_outliers_sd(series.interval(), config.sd_threshold);
    let marked = filter_outliers_relative(&marked, config.threshold_factor);
    let nn = interpolate_nan(&marked);
    if nn.is_empty() || nn.iter().any(|v| v.is_nan()) {
        return Err(Error::AllNaN);
    }
    let time = cumulative_sum(&nn);
    Ok(series.with_samples(time, nn))
}
