use crate::error::{Error, Result};
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

/// One RR recording (or a sub-segment of one).
///
/// `time` is the cumulative offset of every beat in milliseconds, measured on the
/// recording clock whose zero is `origin`. `interval` holds the RR values in
/// milliseconds; NaN marks a filtered-out sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    time: Vec<f64>,
    interval: Vec<f64>,
    name: String,
    shift_ms: i64,
    origin: NaiveDateTime,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
    duration_min: f64,
}

impl Series {
    /// Build a series from an explicit time axis.
    ///
    /// Rejects unequal lengths, empty arrays, an all-NaN interval array, negative
    /// intervals, a non-finite or non-increasing time axis and `start_time > end_time`.
    /// The recording clock zero is taken to be `start_time`.
    pub fn new(
        time: Vec<f64>,
        interval: Vec<f64>,
        name: impl Into<String>,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> Result<Self> {
        check_arrays(&time, &interval)?;
        if start_time > end_time {
            return Err(Error::InvertedBounds {
                start: start_time.to_string(),
                end: end_time.to_string(),
            });
        }
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Empty { what: "name" });
        }
        Ok(Self::from_parts(
            time, interval, name, 0, start_time, start_time, end_time,
        ))
    }

    /// Build a series from raw RR intervals: `time` is their running sum and the end
    /// time is `start_time` plus the last cumulative offset.
    pub fn from_intervals(
        interval: Vec<f64>,
        name: impl Into<String>,
        start_time: NaiveDateTime,
    ) -> Result<Self> {
        let time = cumulative_sum(&interval);
        let last = time.last().copied().ok_or(Error::Empty { what: "interval" })?;
        if !last.is_finite() {
            return Err(Error::NonFiniteTime {
                index: time.len() - 1,
            });
        }
        let end_time = start_time + millis(last);
        Self::new(time, interval, name, start_time, end_time)
    }

    /// Unchecked constructor for values derived inside the crate.
    pub(crate) fn from_parts(
        time: Vec<f64>,
        interval: Vec<f64>,
        name: String,
        shift_ms: i64,
        origin: NaiveDateTime,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> Self {
        let duration_min = minutes_between(start_time, end_time);
        Self {
            time,
            interval,
            name,
            shift_ms,
            origin,
            start_time,
            end_time,
            duration_min,
        }
    }

    /// Same identity and timing, new sample arrays.
    pub(crate) fn with_samples(&self, time: Vec<f64>, interval: Vec<f64>) -> Self {
        Self {
            time,
            interval,
            ..self.clone_meta()
        }
    }

    /// Same identity and samples, new timing bounds (duration is recomputed).
    pub(crate) fn with_bounds(mut self, start_time: NaiveDateTime, end_time: NaiveDateTime) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self.duration_min = minutes_between(start_time, end_time);
        self
    }

    pub(crate) fn with_shift(mut self, shift_ms: i64) -> Self {
        self.shift_ms = shift_ms;
        self
    }

    fn clone_meta(&self) -> Self {
        Self {
            time: Vec::new(),
            interval: Vec::new(),
            name: self.name.clone(),
            shift_ms: self.shift_ms,
            origin: self.origin,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_min: self.duration_min,
        }
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn interval(&self) -> &[f64] {
        &self.interval
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accumulated time offset in milliseconds relative to the original recording.
    pub fn shift_ms(&self) -> i64 {
        self.shift_ms
    }

    /// Absolute timestamp of `time == 0`.
    pub fn origin(&self) -> NaiveDateTime {
        self.origin
    }

    pub fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }

    pub fn end_time(&self) -> NaiveDateTime {
        self.end_time
    }

    pub fn duration_min(&self) -> f64 {
        self.duration_min
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn first_time(&self) -> Option<f64> {
        self.time.first().copied()
    }

    pub fn last_time(&self) -> Option<f64> {
        self.time.last().copied()
    }

    /// `end_time - start_time` in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        millis_between(self.start_time, self.end_time)
    }

    /// Table key: the name plus the accumulated shift rounded to whole seconds.
    pub fn key(&self) -> String {
        let shift_s = (self.shift_ms as f64 / 1000.0).round() as i64;
        format!("{}_{}", self.name, shift_s)
    }

    /// Absolute timestamp of a point on this series' time axis.
    pub fn timestamp_at(&self, offset_ms: f64) -> NaiveDateTime {
        self.origin + millis(offset_ms)
    }
}

/// Two series evaluated together; `a` and `b` keep their roles through every stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPair {
    pub a: Series,
    pub b: Series,
}

impl SeriesPair {
    pub fn new(a: Series, b: Series) -> Self {
        Self { a, b }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Series> {
        [&self.a, &self.b].into_iter()
    }
}

pub(crate) fn millis(ms: f64) -> Duration {
    Duration::microseconds((ms * 1000.0).round() as i64)
}

pub(crate) fn millis_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    (end - start)
        .num_microseconds()
        .map(|us| us as f64 / 1000.0)
        .unwrap_or(f64::NAN)
}

fn minutes_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    millis_between(start, end) / 60_000.0
}

pub(crate) fn cumulative_sum(values: &[f64]) -> Vec<f64> {
    let mut acc = 0.0;
    values
        .iter()
        .map(|v| {
            acc += v;
            acc
        })
        .collect()
}

fn check_arrays(time: &[f64], interval: &[f64]) -> Result<()> {
    if time.len() != interval.len() {
        return Err(Error::LengthMismatch {
            time: time.len(),
            interval: interval.len(),
        });
    }
    if time.is_empty() {
        return Err(Error::Empty { what: "time" });
    }
    if interval.iter().all(|v| v.is_nan()) {
        return Err(Error::AllNaN);
    }
    if let Some((index, &value)) = interval.iter().enumerate().find(|(_, v)| **v < 0.0) {
        return Err(Error::NegativeInterval { index, value });
    }
    if let Some(index) = time.iter().position(|t| !t.is_finite()) {
        return Err(Error::NonFiniteTime { index });
    }
    for (i, w) in time.windows(2).enumerate() {
        if w[1] <= w[0] {
            return Err(Error::NonIncreasingTime {
                index: i + 1,
                prev: w[0],
                next: w[1],
            });
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn from_intervals_builds_cumulative_axis() {
        let s = rr("2rm1", &[800.0, 810.0, 790.0, 805.0]);
        assert_eq!(s.time(), &[800.0, 1610.0, 2400.0, 3205.0]);
        assert_eq!(s.end_time() - s.start_time(), Duration::milliseconds(3205));
        assert_close(s.duration_min(), 3205.0 / 60_000.0, 1e-12);
        assert_eq!(s.key(), "2rm1_0");
    }

    #[test]
    fn rejects_non_increasing_time() {
        let err = Series::new(
            vec![1.0, 2.0, 2.0],
            vec![1.0, 1.0, 0.0],
            "x",
            t0(),
            t0(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NonIncreasingTime { index: 2, .. }));
    }

    #[test]
    fn rejects_shape_and_content_errors() {
        assert!(matches!(
            Series::new(vec![1.0], vec![1.0, 2.0], "x", t0(), t0()),
            Err(Error::LengthMismatch { .. })
        ));
        assert!(matches!(
            Series::new(vec![], vec![], "x", t0(), t0()),
            Err(Error::Empty { .. })
        ));
        assert!(matches!(
            Series::new(vec![1.0, 2.0], vec![f64::NAN, f64::NAN], "x", t0(), t0()),
            Err(Error::AllNaN)
        ));
        assert!(matches!(
            Series::new(vec![1.0, 2.0], vec![1.0, 1.0], "x", t0() + Duration::seconds(1), t0()),
            Err(Error::InvertedBounds { .. })
        ));
    }

    #[test]
    fn key_rounds_shift_to_seconds() {
        let s = rr("2rk1", &[800.0; 5]).with_shift(1500);
        assert_eq!(s.key(), "2rk1_2");
        assert_eq!(s.with_shift(-2500).key(), "2rk1_-3");
    }
}
