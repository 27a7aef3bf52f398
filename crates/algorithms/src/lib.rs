//! # geozonal algorithms
//!
//! Zonal statistics of rasters against vector features, over time series.
//!
//! ## Modules
//!
//! - **vector**: simplification, validity checks, reprojection
//! - **statistics**: rasterized masks and per-band statistics
//! - **temporal**: raster catalog, file-name dates, aggregation across rasters
//! - **pipeline**: configuration and the end-to-end run

pub mod pipeline;
pub mod statistics;
pub mod temporal;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::pipeline::{run, RunConfig, RunSummary};
    pub use crate::statistics::{
        rasterize, ExtractOptions, PixelInclusion, PixelMask, ZonalExtractor, ZonalStatistic,
        ZonalStats,
    };
    pub use crate::temporal::{
        DatePattern, RasterCatalog, RasterEntry, Reducer, StatColumns, TemporalAggregator,
    };
    pub use crate::vector::{
        check_multipolygon, simplify_polygonal, ProjectionContext, SimplifyParams,
    };
    pub use geozonal_core::prelude::*;
}
