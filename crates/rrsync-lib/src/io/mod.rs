//! Reading recordings from disk and writing result tables.

pub mod csv;
pub mod recording;
pub mod text;
