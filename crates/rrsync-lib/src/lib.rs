pub mod config;
pub mod correlation;
pub mod error;
pub mod gaps;
pub mod io;
pub mod metrics;
pub mod resample;
pub mod search;
pub mod series;
pub mod table;
pub mod transform;
pub mod validate;

pub use correlation::{correlate, pearson, Correlation, CorrelationConfig, CorrelationResult};
pub use error::{Error, Result};
pub use gaps::{retain_valid_chunks, split_on_gaps};
pub use resample::{resample_pair, Interpolation};
pub use search::{
    evaluate_pair, find_pairs, search_best_shift, time_align, AnalysisWindow, PairCandidate,
    PairDiscovery, ResultRow, SearchConfig,
};
pub use series::{Series, SeriesPair};
pub use table::SeriesTable;
pub use transform::{filter_series, merge, shift, trim, trim_pair, trim_table, FilterConfig};
pub use validate::{validate, validate_one, Constraints, ValidationReport, Violation};
