//! NaN-aware descriptive statistics. NaN marks a missing sample throughout the crate,
//! so every helper here skips it instead of propagating it.

pub fn valid(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| !v.is_nan())
}

pub fn valid_count(values: &[f64]) -> usize {
    valid(values).count()
}

/// Mean of the non-NaN values; NaN when there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, n) = valid(values).fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Population standard deviation (ddof = 0) of the non-NaN values.
pub fn nan_std(values: &[f64]) -> f64 {
    let mean = nan_mean(values);
    if mean.is_nan() {
        return f64::NAN;
    }
    let n = valid_count(values) as f64;
    let ss: f64 = valid(values).map(|v| (v - mean).powi(2)).sum();
    (ss / n).sqrt()
}

pub fn nan_max(values: &[f64]) -> f64 {
    valid(values).fold(f64::NAN, f64::max)
}

/// `mean ± k·sd` band used by the global outlier stage.
pub fn outlier_bounds(values: &[f64], sd_threshold: f64) -> Option<(f64, f64)> {
    let mean = nan_mean(values);
    let sd = nan_std(values);
    if mean.is_nan() || sd.is_nan() {
        return None;
    }
    Some((mean - sd_threshold * sd, mean + sd_threshold * sd))
}

/// Fisher z-transform of a correlation coefficient, rounded to 4 decimals.
pub fn fisher_z(r: f64) -> f64 {
    if r >= 1.0 {
        return f64::INFINITY;
    }
    if r <= -1.0 {
        return f64::NEG_INFINITY;
    }
    let z = 0.5 * ((1.0 + r) / (1.0 - r)).ln();
    (z * 10_000.0).round() / 10_000.0
}
