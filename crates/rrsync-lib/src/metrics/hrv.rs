use crate::metrics::stats::{nan_mean, valid, valid_count};
use crate::series::Series;
use serde::{Deserialize, Serialize};

const MS_PER_MINUTE: f64 = 60_000.0;

/// Time-domain summary of one series. Intervals are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub key: String,
    pub name: String,
    pub shift_ms: i64,
    pub samples: usize,
    pub valid: usize,
    pub mean_interval_ms: Option<f64>,
    pub mean_hr_bpm: Option<f64>,
    pub sdnn_ms: Option<f64>,
    pub rmssd_ms: Option<f64>,
    pub duration_min: f64,
}

/// Mean heart rate in beats per minute from NN intervals in milliseconds.
pub fn mean_hr(nn: &[f64]) -> Option<f64> {
    let mean = nan_mean(nn);
    if mean.is_nan() || mean <= 0.0 {
        None
    } else {
        Some(MS_PER_MINUTE / mean)
    }
}

/// Beat-by-beat heart rate; missing intervals are skipped.
pub fn instant_hr(nn: &[f64]) -> Vec<f64> {
    valid(nn).map(|x| MS_PER_MINUTE / x).collect()
}

/// Sample standard deviation of the valid intervals.
pub fn sdnn(nn: &[f64]) -> Option<f64> {
    let n = valid_count(nn);
    if n < 2 {
        return None;
    }
    let mean = nan_mean(nn);
    let ss: f64 = valid(nn).map(|x| (x - mean).powi(2)).sum();
    Some((ss / (n as f64 - 1.0)).sqrt())
}

/// Root mean square of successive differences over adjacent valid pairs.
pub fn rmssd(nn: &[f64]) -> Option<f64> {
    let diffs: Vec<f64> = nn
        .windows(2)
        .filter(|w| !w[0].is_nan() && !w[1].is_nan())
        .map(|w| (w[1] - w[0]).powi(2))
        .collect();
    if diffs.is_empty() {
        return None;
    }
    Some((diffs.iter().sum::<f64>() / diffs.len() as f64).sqrt())
}

pub fn summarize(series: &Series) -> SeriesSummary {
    let nn = series.interval();
    let mean = nan_mean(nn);
    SeriesSummary {
        key: series.key(),
        name: series.name().to_string(),
        shift_ms: series.shift_ms(),
        samples: series.len(),
        valid: valid_count(nn),
        mean_interval_ms: (!mean.is_nan()).then_some(mean),
        mean_hr_bpm: mean_hr(nn),
        sdnn_ms: sdnn(nn),
        rmssd_ms: rmssd(nn),
        duration_min: series.duration_min(),
    }
}
