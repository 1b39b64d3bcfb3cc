use crate::error::{Error, Result};
use crate::series::{Series, SeriesPair};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Interpolation used when moving a series onto the shared grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Straight line between neighbours; the boundary segments extend past the domain.
    #[default]
    Linear,
    /// Value of the closest sample; the lower one on ties.
    Nearest,
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpolation::Linear => f.write_str("linear"),
            Interpolation::Nearest => f.write_str("nearest"),
        }
    }
}

impl FromStr for Interpolation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Interpolation::Linear),
            "nearest" => Ok(Interpolation::Nearest),
            other => Err(Error::InvalidParameter {
                name: "method",
                reason: format!("unknown interpolation {other:?}"),
            }),
        }
    }
}

/// Points `lo + k * step` for every `k` that keeps them at or below `hi`.
pub fn uniform_grid(lo: f64, hi: f64, step: f64) -> Vec<f64> {
    if !(lo.is_finite() && hi.is_finite() && step.is_finite() && step > 0.0) || hi < lo {
        return Vec::new();
    }
    // tolerate rounding so that a grid landing exactly on `hi` keeps its last point
    let n = ((hi - lo) / step + 1e-9).floor() as usize;
    (0..=n)
        .map(|k| lo + k as f64 * step)
        .map(|g| g.min(hi))
        .collect()
}

/// Evaluate the function sampled at (`x`, `y`) on every point of `grid`. `x` must be
/// increasing and hold at least two points.
pub fn interpolate(x: &[f64], y: &[f64], grid: &[f64], method: Interpolation) -> Result<Vec<f64>> {
    if x.len() != y.len() {
        return Err(Error::UnequalLengths {
            left: x.len(),
            right: y.len(),
        });
    }
    if x.len() < 2 {
        return Err(Error::TooFewSamples {
            op: "interpolate",
            needed: 2,
            got: x.len(),
        });
    }
    let last = x.len() - 1;
    let values = grid
        .iter()
        .map(|&g| {
            let j = x.partition_point(|&v| v <= g).clamp(1, last);
            let (x0, x1, y0, y1) = (x[j - 1], x[j], y[j - 1], y[j]);
            match method {
                Interpolation::Linear => y0 + (y1 - y0) * (g - x0) / (x1 - x0),
                Interpolation::Nearest => {
                    if g - x0 <= x1 - g {
                        y0
                    } else {
                        y1
                    }
                }
            }
        })
        .collect();
    Ok(values)
}

/// Put both series of `pair` on one uniform grid spanning the overlap of their time
/// axes, `step_ms` apart. Names, shifts and timing metadata are carried over; only the
/// sample arrays change. Disjoint domains give empty series.
pub fn resample_pair(pair: &SeriesPair, step_ms: f64, method: Interpolation) -> Result<SeriesPair> {
    if !(step_ms.is_finite() && step_ms > 0.0) {
        return Err(Error::InvalidParameter {
            name: "step_ms",
            reason: format!("must be a positive finite number, got {step_ms}"),
        });
    }
    let (a, b) = (&pair.a, &pair.b);
    for s in [a, b] {
        if s.len() < 2 {
            return Err(Error::TooFewSamples {
                op: "resample",
                needed: 2,
                got: s.len(),
            });
        }
    }
    let lo = a.time()[0].max(b.time()[0]);
    let hi = a.time()[a.len() - 1].min(b.time()[b.len() - 1]);
    let grid = uniform_grid(lo, hi, step_ms);
    Ok(SeriesPair::new(
        onto_grid(a, &grid, method)?,
        onto_grid(b, &grid, method)?,
    ))
}

fn onto_grid(series: &Series, grid: &[f64], method: Interpolation) -> Result<Series> {
    let values = interpolate(series.time(), series.interval(), grid, method)?;
    Ok(series.with_samples(grid.to_vec(), values))
}
