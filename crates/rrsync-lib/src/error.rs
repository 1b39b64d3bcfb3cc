use thiserror::Error;

/// Contract violations: the caller handed the core something it cannot work with.
///
/// Data-quality problems (too few samples, under-sampled windows, empty trims) are not
/// errors; they surface as a [`crate::validate::ValidationReport`] and an empty result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{what} is empty")]
    Empty { what: &'static str },

    #[error("time has {time} samples but interval has {interval}")]
    LengthMismatch { time: usize, interval: usize },

    #[error("interval contains no valid (non-NaN) samples")]
    AllNaN,

    #[error("interval is negative at index {index} ({value})")]
    NegativeInterval { index: usize, value: f64 },

    #[error("time axis is not finite at index {index}")]
    NonFiniteTime { index: usize },

    #[error("time axis is not strictly increasing at index {index} ({prev} >= {next})")]
    NonIncreasingTime { index: usize, prev: f64, next: f64 },

    #[error("start time {start} is after end time {end}")]
    InvertedBounds { start: String, end: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("need at least {needed} samples to {op}, got {got}")]
    TooFewSamples {
        op: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("correlation inputs differ in length ({left} vs {right})")]
    UnequalLengths { left: usize, right: usize },

    #[error("catalogue needs at least 2 series for pairing, got {count}")]
    CatalogueTooSmall { count: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
