//! Pearson correlation between two aligned series, either over the whole overlap or
//! chunk by chunk across recording gaps.

use crate::error::{Error, Result};
use crate::gaps::{retain_valid_chunks, split_on_gaps, DEFAULT_K_MAX_GAP};
use crate::resample::{resample_pair, Interpolation};
use crate::series::{Series, SeriesPair};
use crate::transform::trim_pair;
use crate::validate::{validate, Constraints};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Spacing of the shared resampling grid.
    pub step_ms: f64,
    pub method: Interpolation,
    /// Minimum ratio of actual to expected samples for a window to be correlated.
    pub sample_ratio_threshold: f64,
    /// Gap factor for split mode, see [`split_on_gaps`].
    pub k_max_gap: f64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            step_ms: 250.0,
            method: Interpolation::Linear,
            sample_ratio_threshold: 0.7,
            k_max_gap: DEFAULT_K_MAX_GAP,
        }
    }
}

/// Coefficient and two-sided p-value of one Pearson test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pearson {
    pub r: f64,
    pub p_value: f64,
    pub n: usize,
}

/// One scored alignment of a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub corr: f64,
    pub p_value: f64,
    pub name_a: String,
    pub name_b: String,
    pub shift_a_ms: i64,
    pub shift_b_ms: i64,
    /// `shift_a_ms - shift_b_ms`
    pub shift_diff_ms: i64,
}

impl CorrelationResult {
    fn new(pair: &SeriesPair, corr: f64, p_value: f64) -> Self {
        Self {
            corr,
            p_value,
            name_a: pair.a.name().to_string(),
            name_b: pair.b.name().to_string(),
            shift_a_ms: pair.a.shift_ms(),
            shift_b_ms: pair.b.shift_ms(),
            shift_diff_ms: pair.a.shift_ms() - pair.b.shift_ms(),
        }
    }
}

/// Result of [`correlate`] together with the resampled data it was computed on.
#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub result: CorrelationResult,
    pub resampled: SeriesPair,
}

/// Pearson correlation of two equally long arrays.
///
/// NaN in either input, or an input without variance, yields NaN for both `r` and the
/// p-value. The p-value comes from Student's t with `n - 2` degrees of freedom.
pub fn pearson(x: &[f64], y: &[f64]) -> Result<Pearson> {
    if x.len() != y.len() {
        return Err(Error::UnequalLengths {
            left: x.len(),
            right: y.len(),
        });
    }
    let n = x.len();
    if n < 2 {
        return Err(Error::TooFewSamples {
            op: "correlate",
            needed: 2,
            got: n,
        });
    }
    let undefined = Pearson {
        r: f64::NAN,
        p_value: f64::NAN,
        n,
    };
    if x.iter().chain(y).any(|v| v.is_nan()) {
        return Ok(undefined);
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (xi, yi) in x.iter().zip(y) {
        let (dx, dy) = (xi - mean_x, yi - mean_y);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return Ok(undefined);
    }
    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    Ok(Pearson {
        r,
        p_value: p_value(r, n)?,
        n,
    })
}

fn p_value(r: f64, n: usize) -> Result<f64> {
    if n == 2 {
        return Ok(1.0);
    }
    if r.abs() >= 1.0 {
        return Ok(0.0);
    }
    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| Error::InvalidParameter {
        name: "degrees_of_freedom",
        reason: format!("failed to create t-distribution: {e}"),
    })?;
    Ok((2.0 * dist.cdf(-t.abs())).min(1.0))
}

/// Score how well the two series of `pair` agree.
///
/// The pair is validated (with the sample-ratio check), trimmed to its common overlap
/// and validated again; a failed validation is logged and yields `Ok(None)`.
///
/// Without `split` both sides are resampled onto one grid and correlated directly.
/// With `split` each side is first cut at its gaps, every cross pair of chunks is
/// trimmed, validated, resampled and correlated on its own, and the result reports the
/// unweighted mean coefficient and p-value over the chunk pairs that worked. The
/// resampled chunks are concatenated per side in start-time order; where one chunk
/// overlaps several chunks of the other side its grid points appear more than once.
pub fn correlate(
    pair: &SeriesPair,
    split: bool,
    config: &CorrelationConfig,
) -> Result<Option<Correlation>> {
    let constraints = Constraints::pair().with_sample_ratio(config.sample_ratio_threshold);
    let context = format!("correlate {} ~ {}", pair.a.key(), pair.b.key());
    if !validate(pair.iter(), &constraints).check(&context) {
        return Ok(None);
    }
    let trimmed = trim_pair(pair, None, None);
    if !validate(trimmed.iter(), &constraints).check(&format!("{context} (trimmed)")) {
        return Ok(None);
    }

    let correlation = if split {
        correlate_chunks(&trimmed, &constraints, config)?
    } else {
        correlate_window(&trimmed, config)?.map(|(pearson, resampled)| Correlation {
            result: CorrelationResult::new(&trimmed, pearson.r, pearson.p_value),
            resampled,
        })
    };
    if let Some(c) = &correlation {
        debug!(
            "{context}: corr={:.4} p={:.4} split={split}",
            c.result.corr, c.result.p_value
        );
    }
    Ok(correlation)
}

fn correlate_window(
    pair: &SeriesPair,
    config: &CorrelationConfig,
) -> Result<Option<(Pearson, SeriesPair)>> {
    let resampled = resample_pair(pair, config.step_ms, config.method)?;
    if resampled.a.len() < 2 {
        warn!(
            "correlate {} ~ {}: overlap too short for a {} ms grid",
            pair.a.key(),
            pair.b.key(),
            config.step_ms
        );
        return Ok(None);
    }
    let pearson = pearson(resampled.a.interval(), resampled.b.interval())?;
    Ok(Some((pearson, resampled)))
}

fn correlate_chunks(
    pair: &SeriesPair,
    constraints: &Constraints,
    config: &CorrelationConfig,
) -> Result<Option<Correlation>> {
    let chunks_a = retain_valid_chunks(&pair.a, split_on_gaps(&pair.a, config.k_max_gap)?);
    let chunks_b = retain_valid_chunks(&pair.b, split_on_gaps(&pair.b, config.k_max_gap)?);

    let mut scored = Vec::new();
    for (i, chunk_a) in chunks_a.iter().enumerate() {
        for (j, chunk_b) in chunks_b.iter().enumerate() {
            let sub = trim_pair(&SeriesPair::new(chunk_a.clone(), chunk_b.clone()), None, None);
            let context = format!(
                "correlate {} ~ {} chunks {i}/{j}",
                pair.a.key(),
                pair.b.key()
            );
            if !validate(sub.iter(), constraints).check(&context) {
                continue;
            }
            if let Some(found) = correlate_window(&sub, config)? {
                scored.push(found);
            }
        }
    }
    if scored.is_empty() {
        warn!(
            "correlate {} ~ {}: no chunk pair could be correlated",
            pair.a.key(),
            pair.b.key()
        );
        return Ok(None);
    }

    let count = scored.len() as f64;
    let corr = scored.iter().map(|(p, _)| p.r).sum::<f64>() / count;
    let p_value = scored.iter().map(|(p, _)| p.p_value).sum::<f64>() / count;
    let (side_a, side_b): (Vec<Series>, Vec<Series>) =
        scored.into_iter().map(|(_, r)| (r.a, r.b)).unzip();
    Ok(Some(Correlation {
        result: CorrelationResult::new(pair, corr, p_value),
        resampled: SeriesPair::new(concat(&pair.a, side_a), concat(&pair.b, side_b)),
    }))
}

fn concat(whole: &Series, mut pieces: Vec<Series>) -> Series {
    pieces.sort_by_key(|s| s.start_time());
    let time = pieces.iter().flat_map(|s| s.time().iter().copied()).collect();
    let interval = pieces.iter().flat_map(|s| s.interval().iter().copied()).collect();
    whole.with_samples(time, interval)
}
