//! Collect-all-errors validation of one or more series.
//!
//! Validation never fails fast: every series in scope is checked and every violation is
//! recorded, so a caller working through a batch gets complete diagnostics for the unit
//! it is about to skip.

use crate::metrics::stats::{nan_mean, valid_count};
use crate::series::Series;
use chrono::NaiveDateTime;
use log::warn;
use std::fmt;
use thiserror::Error;

/// A series needs strictly more valid samples than this to be usable.
pub const MIN_VALID_EXCLUSIVE: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Constraints {
    pub min_count: Option<usize>,
    pub max_count: Option<usize>,
    /// Minimum ratio of actual to expected samples, where the expectation is
    /// `duration_ms / mean(interval)`.
    pub sample_ratio_threshold: Option<f64>,
}

impl Constraints {
    pub fn single() -> Self {
        Self {
            min_count: Some(1),
            max_count: Some(1),
            sample_ratio_threshold: None,
        }
    }

    pub fn pair() -> Self {
        Self {
            min_count: Some(2),
            max_count: Some(2),
            sample_ratio_threshold: None,
        }
    }

    pub fn at_least(min_count: usize) -> Self {
        Self {
            min_count: Some(min_count),
            ..Self::default()
        }
    }

    pub fn with_sample_ratio(mut self, threshold: f64) -> Self {
        self.sample_ratio_threshold = Some(threshold);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Time,
    Interval,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Time => f.write_str("time"),
            Field::Interval => f.write_str("interval"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Violation {
    #[error("scope must contain no fewer than {min} series but has {actual}")]
    TooFew { min: usize, actual: usize },

    #[error("scope must contain no more than {max} series but has {actual}")]
    TooMany { max: usize, actual: usize },

    #[error("{key}: name is empty")]
    EmptyName { key: String },

    #[error("{key}: time has {time} samples but interval has {interval}")]
    LengthMismatch {
        key: String,
        time: usize,
        interval: usize,
    },

    #[error("{key}: start time {start} is after end time {end}")]
    InvertedBounds {
        key: String,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("{key}: duration is not finite")]
    NonFiniteDuration { key: String },

    #[error("{key}: {field} must have more than 3 valid elements but has {valid}")]
    TooFewValid {
        key: String,
        field: Field,
        valid: usize,
    },

    #[error("{key}: {actual} samples is below {threshold} x {estimated:.2} expected samples")]
    UnderSampled {
        key: String,
        actual: usize,
        estimated: f64,
        threshold: f64,
    },

    #[error("{key}: mean interval {mean} cannot estimate the expected sample count")]
    InvalidMeanInterval { key: String, mean: f64 },
}

/// Outcome of [`validate`]: the keys that were in scope and every violation found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    scope: Vec<String>,
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// Emit one warning per violation, tagged with `context`, and return `is_valid()`.
    pub fn check(&self, context: &str) -> bool {
        if !self.is_valid() {
            warn!(
                "{context}: validation failed for {:?} ({} violation(s))",
                self.scope,
                self.violations.len()
            );
            for violation in &self.violations {
                warn!("{context}: - {violation}");
            }
        }
        self.is_valid()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            return write!(f, "{:?}: valid", self.scope);
        }
        write!(f, "validation errors for {:?}:", self.scope)?;
        for v in &self.violations {
            write!(f, "\n- {v}")?;
        }
        Ok(())
    }
}

pub fn validate<'a, I>(scope: I, constraints: &Constraints) -> ValidationReport
where
    I: IntoIterator<Item = &'a Series>,
{
    let series: Vec<&Series> = scope.into_iter().collect();
    let mut report = ValidationReport {
        scope: series.iter().map(|s| s.key()).collect(),
        violations: Vec::new(),
    };
    let violations = &mut report.violations;

    let count = series.len();
    if let Some(max) = constraints.max_count {
        if count > max {
            violations.push(Violation::TooMany { max, actual: count });
        }
    }
    if let Some(min) = constraints.min_count {
        if count < min {
            violations.push(Violation::TooFew { min, actual: count });
        }
    }

    for s in &series {
        check_fields(s, violations);
    }

    if let Some(threshold) = constraints.sample_ratio_threshold {
        for s in &series {
            check_sample_ratio(s, threshold, violations);
        }
    }

    report
}

pub fn validate_one(series: &Series, sample_ratio_threshold: Option<f64>) -> ValidationReport {
    let constraints = Constraints {
        sample_ratio_threshold,
        ..Constraints::single()
    };
    validate([series], &constraints)
}

fn check_fields(s: &Series, violations: &mut Vec<Violation>) {
    let key = s.key();
    if s.name().is_empty() {
        violations.push(Violation::EmptyName { key: key.clone() });
    }
    if s.time().len() != s.interval().len() {
        violations.push(Violation::LengthMismatch {
            key: key.clone(),
            time: s.time().len(),
            interval: s.interval().len(),
        });
    }
    if s.start_time() > s.end_time() {
        violations.push(Violation::InvertedBounds {
            key: key.clone(),
            start: s.start_time(),
            end: s.end_time(),
        });
    }
    if !s.duration_min().is_finite() {
        violations.push(Violation::NonFiniteDuration { key: key.clone() });
    }
    for (field, values) in [(Field::Time, s.time()), (Field::Interval, s.interval())] {
        let valid = valid_count(values);
        if valid <= MIN_VALID_EXCLUSIVE {
            violations.push(Violation::TooFewValid {
                key: key.clone(),
                field,
                valid,
            });
        }
    }
}

fn check_sample_ratio(s: &Series, threshold: f64, violations: &mut Vec<Violation>) {
    let mean = nan_mean(s.interval());
    if mean.is_nan() || mean <= 0.0 {
        violations.push(Violation::InvalidMeanInterval { key: s.key(), mean });
        return;
    }
    let estimated = s.duration_ms() / mean;
    if (s.len() as f64) < threshold * estimated {
        violations.push(Violation::UnderSampled {
            key: s.key(),
            actual: s.len(),
            estimated,
            threshold,
        });
    }
}
