use crate::io::text::read_rr_intervals;
use crate::series::Series;
use crate::table::SeriesTable;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// What a recording's file name says about it.
///
/// Files are named `"<name> <YYYY-MM-DD> <HH-MM-SS>"`, e.g. `"2om2 2023-08-22 22-05-27"`.
/// The name is a measurement number, a measurement type letter, a role letter and a
/// pair number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingMeta {
    pub name: String,
    pub measurement_number: Option<u32>,
    pub measurement_type: Option<char>,
    pub role: Option<char>,
    pub pair_number: Option<u32>,
    pub start_time: NaiveDateTime,
}

impl RecordingMeta {
    pub fn parse(stem: &str) -> Result<Self> {
        let parts: Vec<&str> = stem.split_whitespace().collect();
        let [name, date, time] = parts.as_slice() else {
            anyhow::bail!("file name {stem:?} is not \"<name> <YYYY-MM-DD> <HH-MM-SS>\"");
        };
        let start_time = NaiveDateTime::parse_from_str(&format!("{date}{time}"), "%Y-%m-%d%H-%M-%S")
            .with_context(|| format!("parsing start time from {stem:?}"))?;

        let digits_at_start = name.len() - name.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        let digits_at_end = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        let mut letters = name.chars().filter(|c| !c.is_ascii_digit());
        Ok(Self {
            name: name.to_string(),
            measurement_number: name[..digits_at_start].parse().ok(),
            measurement_type: letters.next(),
            role: letters.next(),
            pair_number: name[name.len() - digits_at_end..].parse().ok(),
            start_time,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("no usable file name in {}", path.display()))?;
        Self::parse(stem)
    }
}

/// Load one RR text file as a series starting at the time in its name.
pub fn load_recording(path: &Path) -> Result<Series> {
    let meta = RecordingMeta::from_path(path)?;
    let interval = read_rr_intervals(path)?;
    debug!("loaded {} ({} intervals)", path.display(), interval.len());
    Series::from_intervals(interval, meta.name, meta.start_time)
        .with_context(|| format!("building series from {}", path.display()))
}

/// Load every `*.txt` recording in `dir`, in path order. Recordings that share a name
/// are all kept as separate pieces.
pub fn load_catalogue(dir: &Path) -> Result<SeriesTable> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("failed to list {}", dir.display()))?;
    paths.retain(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"));
    paths.sort();

    let mut table = SeriesTable::new();
    for path in &paths {
        table.push(load_recording(path)?);
    }
    for name in table.names() {
        let pieces = table.pieces(name);
        if pieces > 1 {
            warn!("{name}: {pieces} recordings share this name; merge them to use all of them");
        }
    }
    info!("loaded {} recording(s) from {}", table.len(), dir.display());
    Ok(table)
}
