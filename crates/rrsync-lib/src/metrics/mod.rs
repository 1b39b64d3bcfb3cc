pub mod hrv;
pub mod stats;

pub use hrv::*;
pub use stats::*;
