//! # geozonal core
//!
//! Core types and I/O for zonal statistics over raster time series.
//!
//! This crate provides:
//! - `Raster`, `GeoTransform`, `PixelWindow`: gridded data and georeferencing
//! - `CRS`: Coordinate Reference System identification
//! - `Feature`, `FeatureCollection`: vector features with ordered attributes
//! - `RasterSource` / `VectorSink`: format-independent access, with native
//!   GeoTIFF, optional GDAL, GeoJSON and CSV implementations

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, PixelWindow, Raster};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::io::{RasterSource, VectorSink};
    pub use crate::raster::{GeoTransform, PixelWindow, Raster};
    pub use crate::vector::{AttributeValue, Attributes, Feature, FeatureCollection};
}
