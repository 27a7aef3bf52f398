//! Time series handling
//!
//! - **date**: date keys parsed from raster file names
//! - **catalog**: ordered raster inputs
//! - **aggregate**: folding per-raster statistics into attributes and tables

pub mod aggregate;
pub mod catalog;
pub mod date;

pub use aggregate::{Reducer, StatColumns, TemporalAggregator};
pub use catalog::{expand_patterns, RasterCatalog, RasterEntry};
pub use date::{DateKeyFailure, DatePattern, DEFAULT_DATE_FORMAT, DEFAULT_DATE_PATTERN};
