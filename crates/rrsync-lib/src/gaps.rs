//! Splitting a series at recording gaps.

use crate::error::{Error, Result};
use crate::metrics::stats::nan_max;
use crate::series::Series;
use crate::validate::validate_one;
use chrono::NaiveDateTime;
use log::warn;
use serde::Serialize;

/// Default multiple of the largest interval above which a time step counts as a gap.
pub const DEFAULT_K_MAX_GAP: f64 = 5.0;

/// Cut `series` wherever two consecutive samples are more than
/// `max(interval) * k_max_gap` apart in time.
///
/// Every sample lands in exactly one chunk and chunks are chronological, so concatenating
/// them gives back the input arrays. Chunk timing is re-derived from the chunk's own
/// first and last sample.
pub fn split_on_gaps(series: &Series, k_max_gap: f64) -> Result<Vec<Series>> {
    if !(k_max_gap.is_finite() && k_max_gap > 0.0) {
        return Err(Error::InvalidParameter {
            name: "k_max_gap",
            reason: format!("must be a positive finite number, got {k_max_gap}"),
        });
    }
    if series.is_empty() {
        return Err(Error::Empty { what: "series" });
    }

    let max_gap = nan_max(series.interval()) * k_max_gap;
    let time = series.time();
    let mut chunks = Vec::new();
    let mut begin = 0;
    for i in 1..time.len() {
        if time[i] - time[i - 1] > max_gap {
            chunks.push(chunk(series, begin, i));
            begin = i;
        }
    }
    chunks.push(chunk(series, begin, time.len()));
    Ok(chunks)
}

fn chunk(series: &Series, begin: usize, end: usize) -> Series {
    let time = series.time()[begin..end].to_vec();
    let interval = series.interval()[begin..end].to_vec();
    let start = series.timestamp_at(time[0]);
    let stop = series.timestamp_at(time[time.len() - 1]);
    series.with_samples(time, interval).with_bounds(start, stop)
}

/// Drop chunks that do not pass single-series validation. When nothing survives the
/// unsplit `series` is returned as the only chunk.
pub fn retain_valid_chunks(series: &Series, chunks: Vec<Series>) -> Vec<Series> {
    let total = chunks.len();
    let kept: Vec<Series> = chunks
        .into_iter()
        .enumerate()
        .filter(|(i, c)| {
            let report = validate_one(c, None);
            report.check(&format!("split {} chunk {}/{}", series.key(), i + 1, total))
        })
        .map(|(_, c)| c)
        .collect();
    if kept.is_empty() {
        warn!(
            "split {}: none of {total} chunk(s) is usable; keeping the series whole",
            series.key()
        );
        return vec![series.clone()];
    }
    kept
}

/// Shape of one chunk, as reported by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkSummary {
    pub index: usize,
    pub samples: usize,
    pub first_time_ms: Option<f64>,
    pub last_time_ms: Option<f64>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub duration_min: f64,
}

pub fn summarize_chunks(chunks: &[Series]) -> Vec<ChunkSummary> {
    chunks
        .iter()
        .enumerate()
        .map(|(index, c)| ChunkSummary {
            index,
            samples: c.len(),
            first_time_ms: c.first_time(),
            last_time_ms: c.last_time(),
            start_time: c.start_time(),
            end_time: c.end_time(),
            duration_min: c.duration_min(),
        })
        .collect()
}
