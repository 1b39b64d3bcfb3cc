use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::warn;
use rrsync_lib::{
    config::{load_config, AnalysisConfig},
    correlate, filter_series, find_pairs,
    gaps::{split_on_gaps, summarize_chunks},
    io::{
        csv::write_results,
        recording::{load_catalogue, load_recording},
    },
    merge,
    metrics::hrv::summarize,
    search_best_shift, AnalysisWindow, CorrelationConfig, FilterConfig, Interpolation,
    SeriesPair, SeriesTable,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "rrsync",
    version,
    about = "Align and cross-correlate RR interval recordings from paired devices"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Method {
    Linear,
    Nearest,
}

impl From<Method> for Interpolation {
    fn from(method: Method) -> Self {
        match method {
            Method::Linear => Interpolation::Linear,
            Method::Nearest => Interpolation::Nearest,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Time-domain summary of one recording
    Summary {
        #[arg(long)]
        input: PathBuf,
    },
    /// Remove outliers and print the filled NN intervals, one per line
    Filter {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 3.0)]
        sd_threshold: f64,
        #[arg(long, default_value_t = 0.2)]
        threshold_factor: f64,
    },
    /// Cut a recording at its gaps and describe the chunks
    Split {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 5.0)]
        k_max_gap: f64,
    },
    /// List the recording pairs found in a directory
    Pairs {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long, default_value_t = 'm')]
        role_a: char,
        #[arg(long, default_value_t = 'k')]
        role_b: char,
    },
    /// Correlate two recordings over their overlap
    Correlate {
        #[arg(long)]
        a: PathBuf,
        #[arg(long)]
        b: PathBuf,
        /// Correlate chunk by chunk across gaps
        #[arg(long)]
        split: bool,
        #[arg(long, default_value_t = 250.0)]
        step_ms: f64,
        #[arg(long, value_enum, default_value_t = Method::Linear)]
        method: Method,
    },
    /// Search every pair in a directory for its best-correlated shift
    Search {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        start_ms: Option<f64>,
        #[arg(long)]
        end_ms: Option<f64>,
        #[arg(long)]
        group_label: Option<String>,
        /// TOML file with analysis settings
        #[arg(long)]
        config: Option<PathBuf>,
        /// Join recordings that share a name first
        #[arg(long)]
        merge: bool,
        /// Run the outlier filter on every recording first
        #[arg(long)]
        filter: bool,
        /// Also write the result table as CSV
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Summary { input } => cmd_summary(&input)?,
        Commands::Filter {
            input,
            sd_threshold,
            threshold_factor,
        } => cmd_filter(
            &input,
            FilterConfig {
                sd_threshold,
                threshold_factor,
            },
        )?,
        Commands::Split { input, k_max_gap } => cmd_split(&input, k_max_gap)?,
        Commands::Pairs {
            dir,
            role_a,
            role_b,
        } => cmd_pairs(&dir, role_a, role_b)?,
        Commands::Correlate {
            a,
            b,
            split,
            step_ms,
            method,
        } => cmd_correlate(
            &a,
            &b,
            split,
            CorrelationConfig {
                step_ms,
                method: method.into(),
                ..CorrelationConfig::default()
            },
        )?,
        Commands::Search {
            dir,
            start_ms,
            end_ms,
            group_label,
            config,
            merge,
            filter,
            out,
        } => {
            let mut settings = match config.as_deref() {
                Some(path) => load_config(path)?,
                None => AnalysisConfig::default(),
            };
            settings.merge |= merge;
            settings.filter_outliers |= filter;
            if let Some(label) = group_label {
                settings.group_label = Some(label);
            }
            let window = match (start_ms, end_ms, settings.window) {
                (Some(start), Some(end), _) => AnalysisWindow::new(start, end)?,
                (None, None, Some(window)) => window,
                _ => bail!("give both --start-ms and --end-ms, or a [window] in --config"),
            };
            cmd_search(&dir, window, &settings, out.as_deref())?
        }
    }
    Ok(())
}

fn cmd_summary(input: &Path) -> Result<()> {
    let series = load_recording(input)?;
    println!("{}", serde_json::to_string(&summarize(&series))?);
    Ok(())
}

fn cmd_filter(input: &Path, config: FilterConfig) -> Result<()> {
    let series = load_recording(input)?;
    let nn = filter_series(&series, &config)
        .with_context(|| format!("filtering {}", input.display()))?;
    for value in nn.interval() {
        println!("{value}");
    }
    Ok(())
}

fn cmd_split(input: &Path, k_max_gap: f64) -> Result<()> {
    let series = load_recording(input)?;
    let chunks = split_on_gaps(&series, k_max_gap)?;
    println!("{}", serde_json::to_string(&summarize_chunks(&chunks))?);
    Ok(())
}

fn cmd_pairs(dir: &Path, role_a: char, role_b: char) -> Result<()> {
    let table = load_catalogue(dir)?;
    let discovery = find_pairs(&table, role_a, role_b);
    println!("{}", serde_json::to_string(&discovery)?);
    Ok(())
}

fn cmd_correlate(a: &Path, b: &Path, split: bool, config: CorrelationConfig) -> Result<()> {
    let pair = SeriesPair::new(load_recording(a)?, load_recording(b)?);
    let correlation = correlate(&pair, split, &config)?;
    let result = correlation.map(|c| c.result);
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn cmd_search(
    dir: &Path,
    window: AnalysisWindow,
    settings: &AnalysisConfig,
    out: Option<&Path>,
) -> Result<()> {
    let mut table = load_catalogue(dir)?;
    if settings.merge {
        table = merge(&table);
    }
    if settings.filter_outliers {
        table = filter_catalogue(&table, &settings.filter);
    }
    let label = match &settings.group_label {
        Some(label) => label.clone(),
        None => dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let rows = search_best_shift(&table, window, &label, &settings.search)?;
    for row in &rows {
        println!("{}", serde_json::to_string(row)?);
    }
    if let Some(path) = out {
        write_results(path, &rows)?;
    }
    Ok(())
}

fn filter_catalogue(table: &SeriesTable, config: &FilterConfig) -> SeriesTable {
    table
        .values()
        .map(|series| match filter_series(series, config) {
            Ok(filtered) => filtered,
            Err(err) => {
                warn!("filter {}: {err}; keeping it unfiltered", series.key());
                series.clone()
            }
        })
        .collect()
}
