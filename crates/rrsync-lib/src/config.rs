use crate::search::{AnalysisWindow, SearchConfig};
use crate::transform::FilterConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Everything a catalogue analysis can be tuned with, as read from a TOML file.
///
/// ```toml
/// merge = true
/// group_label = "night"
///
/// [window]
/// start_ms = 0.0
/// end_ms = 3600000.0
///
/// [search]
/// shifts_ms = [500, 1000, 1500]
///
/// [search.correlation]
/// step_ms = 125.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Join recordings sharing a name before searching.
    pub merge: bool,
    /// Run the outlier filter on every recording before searching.
    pub filter_outliers: bool,
    pub group_label: Option<String>,
    pub window: Option<AnalysisWindow>,
    pub filter: FilterConfig,
    pub search: SearchConfig,
}

pub fn load_config(path: &Path) -> Result<AnalysisConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: AnalysisConfig =
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))?;
    if let Some(window) = config.window {
        AnalysisWindow::new(window.start_ms, window.end_ms)
            .with_context(|| format!("window in config {}", path.display()))?;
    }
    Ok(config)
}
