//! Error types for geozonal

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for geozonal operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on {path}: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Duplicate feature id '{id}': features {first} and {second} share it")]
    DuplicateId {
        id: String,
        first: usize,
        second: usize,
    },

    #[error("Invalid geometry for feature {index}: {reason}")]
    InvalidGeometry { index: usize, reason: String },

    #[error("Reprojection from {source_crs} to {target_crs} failed at ({x}, {y}): {reason}")]
    Reprojection {
        source_crs: String,
        target_crs: String,
        x: f64,
        y: f64,
        reason: String,
    },

    #[error("Undefined coordinate reference system: {0}")]
    UndefinedCrs(String),

    #[error("Invalid raster pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Temporal key error for {path}: {reason}")]
    TemporalKey { path: PathBuf, reason: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Band {band} out of range (raster has {count} bands)")]
    BandOutOfRange { band: usize, count: usize },

    #[error("Window ({col_off}, {row_off}) {cols}x{rows} exceeds raster of size {raster_cols}x{raster_rows}")]
    WindowOutOfBounds {
        col_off: usize,
        row_off: usize,
        cols: usize,
        rows: usize,
        raster_cols: usize,
        raster_rows: usize,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Unsupported format for {path}: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("Raster decode error in {path}: {reason}")]
    RasterDecode { path: PathBuf, reason: String },

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("GDAL error: {0}")]
    #[cfg(feature = "gdal")]
    Gdal(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

impl Error {
    /// Attach a path to a bare I/O error
    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::IoAt {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for geozonal operations
pub type Result<T> = std::result::Result<T, Error>;
