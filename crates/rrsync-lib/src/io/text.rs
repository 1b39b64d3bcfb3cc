use anyhow::{Context, Result};
use std::path::Path;

/// Parse newline-delimited RR intervals in whole milliseconds. Blank lines are skipped;
/// anything else that is not a non-negative integer is an error.
pub fn parse_rr_intervals(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            anyhow::bail!("line {} is not an RR interval: {}", idx + 1, trimmed);
        }
        let val: u64 = trimmed
            .parse()
            .with_context(|| format!("line {} is out of range: {}", idx + 1, trimmed))?;
        out.push(val as f64);
    }
    if out.is_empty() {
        anyhow::bail!("no RR intervals found");
    }
    Ok(out)
}

pub fn read_rr_intervals(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_rr_intervals(&text).with_context(|| format!("parsing {}", path.display()))
}
