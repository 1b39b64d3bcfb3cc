use crate::search::ResultRow;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::path::Path;

/// Write the search result table with a header row. Empty cells mark pairs that could
/// not be scored.
pub fn write_results(path: &Path, rows: &[ResultRow]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("writing row {} ~ {}", row.name_a, row.name_b))?;
    }
    writer.flush().context("flushing results")?;
    Ok(())
}

pub fn read_results(path: &Path) -> Result<Vec<ResultRow>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening results {}", path.display()))?;
    let mut rows = Vec::new();
    for (idx, row) in reader.deserialize::<ResultRow>().enumerate() {
        rows.push(row.with_context(|| format!("parsing result row {}", idx + 1))?);
    }
    Ok(rows)
}
