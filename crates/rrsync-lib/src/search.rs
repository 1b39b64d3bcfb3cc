//! Pair discovery and the shift search that picks the best-correlated alignment of each
//! pair in a catalogue.

use crate::correlation::{correlate, CorrelationConfig, CorrelationResult};
use crate::error::{Error, Result};
use crate::series::{millis_between, Series, SeriesPair};
use crate::table::SeriesTable;
use crate::transform::{shift, trim, trim_pair};
use crate::validate::{validate, validate_one, Constraints};
use chrono::Duration;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Two recordings of one subject, identified by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairCandidate {
    pub name_a: String,
    pub name_b: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PairDiscovery {
    pub pairs: Vec<PairCandidate>,
    /// Names that took part in no pair.
    pub unmatched: Vec<String>,
}

/// Absolute bounds, in milliseconds on the series' time axes, of the part of each
/// recording the search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start_ms: f64,
    pub end_ms: f64,
}

impl AnalysisWindow {
    pub fn new(start_ms: f64, end_ms: f64) -> Result<Self> {
        if !(start_ms.is_finite() && end_ms.is_finite()) || start_ms > end_ms {
            return Err(Error::InvalidParameter {
                name: "window",
                reason: format!("[{start_ms}, {end_ms}] is not a finite increasing range"),
            });
        }
        Ok(Self { start_ms, end_ms })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Letter at index 2 of the name on side A.
    pub role_a: char,
    pub role_b: char,
    /// Start times further apart than this are pulled together before searching.
    pub align_threshold_ms: f64,
    /// Offsets tried on each side, in order.
    pub shifts_ms: Vec<i64>,
    pub correlation: CorrelationConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            role_a: 'm',
            role_b: 'k',
            align_threshold_ms: 1000.0,
            shifts_ms: (1..=5).map(|k| k * 1000).collect(),
            correlation: CorrelationConfig::default(),
        }
    }
}

/// Every candidate scored for one pair, base alignment first, plus the winner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairEvaluation {
    pub pair: PairCandidate,
    pub candidates: Vec<CorrelationResult>,
    pub best: Option<CorrelationResult>,
}

/// One line of the result table. The numeric columns are empty when no alignment of
/// the pair could be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub name_a: String,
    pub name_b: String,
    pub corr: Option<f64>,
    pub p_value: Option<f64>,
    pub shift_a_ms: Option<i64>,
    pub shift_b_ms: Option<i64>,
    pub shift_diff_ms: Option<i64>,
    pub group_label: String,
}

impl ResultRow {
    fn new(pair: &PairCandidate, best: Option<&CorrelationResult>, group_label: &str) -> Self {
        Self {
            name_a: pair.name_a.clone(),
            name_b: pair.name_b.clone(),
            corr: best.map(|b| b.corr),
            p_value: best.map(|b| b.p_value),
            shift_a_ms: best.map(|b| b.shift_a_ms),
            shift_b_ms: best.map(|b| b.shift_b_ms),
            shift_diff_ms: best.map(|b| b.shift_diff_ms),
            group_label: group_label.to_string(),
        }
    }
}

/// Trailing run of ASCII digits parsed as an integer, so `"05"` and `"5"` agree.
fn numeric_suffix(name: &str) -> Option<u64> {
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    name[name.len() - digits..].parse().ok()
}

fn pairing_key(name: &str, role: char) -> Option<(String, u64)> {
    let mut chars = name.chars();
    let prefix: String = chars.by_ref().take(2).collect();
    if prefix.chars().count() < 2 || chars.next() != Some(role) {
        return None;
    }
    Some((prefix, numeric_suffix(name)?))
}

/// Pair names that share their first two characters and numeric suffix, with `role_a`
/// and `role_b` as their third character. Pairs come out sorted and unique.
pub fn find_pairs(table: &SeriesTable, role_a: char, role_b: char) -> PairDiscovery {
    let names = table.names();
    let mut pairs = BTreeSet::new();
    for name_a in &names {
        let Some(key_a) = pairing_key(name_a, role_a) else {
            continue;
        };
        for name_b in &names {
            if pairing_key(name_b, role_b).as_ref() == Some(&key_a) {
                pairs.insert(PairCandidate {
                    name_a: name_a.to_string(),
                    name_b: name_b.to_string(),
                });
            }
        }
    }
    let paired: BTreeSet<&str> = pairs
        .iter()
        .flat_map(|p| [p.name_a.as_str(), p.name_b.as_str()])
        .collect();
    let unmatched = names
        .iter()
        .filter(|n| !paired.contains(*n))
        .map(|n| n.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    PairDiscovery {
        pairs: pairs.into_iter().collect(),
        unmatched,
    }
}

/// Pull the start times of a pair to within `threshold_ms` of each other by moving the
/// side that starts earlier later in time.
///
/// The moved side keeps its `shift_ms`, so shift differences reported by the search
/// count only the search offsets.
pub fn time_align(pair: &SeriesPair, threshold_ms: f64) -> SeriesPair {
    let diff = millis_between(pair.b.start_time(), pair.a.start_time());
    if diff > threshold_ms {
        let by = (diff - threshold_ms).round() as i64;
        SeriesPair::new(pair.a.clone(), displace(&pair.b, by))
    } else if diff < -threshold_ms {
        let by = (diff.abs() - threshold_ms).round() as i64;
        SeriesPair::new(displace(&pair.a, by), pair.b.clone())
    } else {
        pair.clone()
    }
}

/// Move samples and timing bounds by `by_ms` without touching `shift_ms`.
fn displace(series: &Series, by_ms: i64) -> Series {
    let by = Duration::milliseconds(by_ms);
    shift(series, by_ms)
        .with_shift(series.shift_ms())
        .with_bounds(series.start_time() + by, series.end_time() + by)
}

fn lookup<'a>(table: &'a SeriesTable, name: &str) -> Option<&'a Series> {
    let found = table.get_by_name(name);
    match table.pieces(name) {
        0 => warn!("search: {name} is not in the catalogue"),
        1 => {}
        n => warn!("search: {name} has {n} unmerged pieces; using the first"),
    }
    found
}

/// Score the base alignment of `candidate` and every configured shift of either side,
/// then pick the best.
///
/// The winner has the largest `|corr|`; NaN scores never win, equal scores go to the
/// smaller `|shift_diff_ms|` and then to the earlier candidate.
pub fn evaluate_pair(
    table: &SeriesTable,
    candidate: &PairCandidate,
    window: AnalysisWindow,
    config: &SearchConfig,
) -> Result<PairEvaluation> {
    let mut evaluation = PairEvaluation {
        pair: candidate.clone(),
        candidates: Vec::new(),
        best: None,
    };
    let (Some(a), Some(b)) = (
        lookup(table, &candidate.name_a),
        lookup(table, &candidate.name_b),
    ) else {
        return Ok(evaluation);
    };

    let ratio = config.correlation.sample_ratio_threshold;
    let (lo, hi) = (Some(window.start_ms), Some(window.end_ms));
    let aligned = time_align(&SeriesPair::new(a.clone(), b.clone()), config.align_threshold_ms);
    let trimmed = trim_pair(&aligned, lo, hi);
    let context = format!("search {} ~ {}", candidate.name_a, candidate.name_b);
    if !validate(trimmed.iter(), &Constraints::pair().with_sample_ratio(ratio)).check(&context) {
        return Ok(evaluation);
    }

    let mut scored = Vec::new();
    scored.push(correlate(&trimmed, false, &config.correlation)?);
    for &offset in &config.shifts_ms {
        let shifted_a = trim(&shift(&aligned.a, offset), lo, hi);
        let shifted_b = trim(&shift(&aligned.b, offset), lo, hi);
        if validate_one(&shifted_a, Some(ratio)).check(&format!("{context} (a +{offset} ms)")) {
            let pair = SeriesPair::new(shifted_a, trimmed.b.clone());
            scored.push(correlate(&pair, false, &config.correlation)?);
        }
        if validate_one(&shifted_b, Some(ratio)).check(&format!("{context} (b +{offset} ms)")) {
            let pair = SeriesPair::new(trimmed.a.clone(), shifted_b);
            scored.push(correlate(&pair, true, &config.correlation)?);
        }
    }

    evaluation.candidates = scored.into_iter().flatten().map(|c| c.result).collect();
    evaluation.best = select_best(&evaluation.candidates).cloned();
    Ok(evaluation)
}

fn select_best(candidates: &[CorrelationResult]) -> Option<&CorrelationResult> {
    candidates
        .iter()
        .filter(|c| !c.corr.is_nan())
        .fold(None, |best: Option<&CorrelationResult>, c| match best {
            Some(b)
                if c.corr.abs() < b.corr.abs()
                    || (c.corr.abs() == b.corr.abs()
                        && c.shift_diff_ms.abs() >= b.shift_diff_ms.abs()) =>
            {
                Some(b)
            }
            _ => Some(c),
        })
}

/// Run [`evaluate_pair`] for every pair [`find_pairs`] discovers in `table` and report
/// one row per pair, in discovery order.
pub fn search_best_shift(
    table: &SeriesTable,
    window: AnalysisWindow,
    group_label: &str,
    config: &SearchConfig,
) -> Result<Vec<ResultRow>> {
    if table.len() < 2 {
        return Err(Error::CatalogueTooSmall { count: table.len() });
    }
    let discovery = find_pairs(table, config.role_a, config.role_b);
    info!(
        "search {group_label}: {} pair(s), {} unmatched name(s)",
        discovery.pairs.len(),
        discovery.unmatched.len()
    );
    if !discovery.unmatched.is_empty() {
        info!("search {group_label}: unmatched {:?}", discovery.unmatched);
    }

    let row = |candidate: &PairCandidate| -> Result<ResultRow> {
        let evaluation = evaluate_pair(table, candidate, window, config)?;
        Ok(ResultRow::new(candidate, evaluation.best.as_ref(), group_label))
    };

    #[cfg(feature = "parallel")]
    let rows = {
        use rayon::prelude::*;
        discovery.pairs.par_iter().map(row).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let rows = discovery.pairs.iter().map(row).collect();
    rows
}
