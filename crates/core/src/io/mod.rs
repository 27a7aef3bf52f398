//! I/O for raster sources, vector files and tabular output
//!
//! Formats are reached through capability traits ([`RasterSource`],
//! [`VectorSink`]); the implementation is picked once, when a path is opened.

mod fields;
#[cfg(feature = "gdal")]
mod gdal_io;
mod geojson_io;
mod native;
mod table;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, PixelWindow, Raster};
use crate::vector::FeatureCollection;
use ndarray::Array2;
use std::path::{Path, PathBuf};

pub use fields::FieldNamer;
#[cfg(feature = "gdal")]
pub use gdal_io::GdalRasterSource;
pub use geojson_io::{read_geojson, write_geojson, GeoJsonSink};
pub use native::{read_geotiff, write_geotiff, GeoTiffOptions};
pub use table::{sanitize_file_stem, write_table, Table};

/// A readable raster dataset.
///
/// Bands are addressed 0-indexed. Implementations may hold the whole image in
/// memory or read windows lazily from disk.
pub trait RasterSource {
    /// Human-readable origin, usually the file path
    fn description(&self) -> String;

    /// Dimensions as (rows, cols)
    fn shape(&self) -> (usize, usize);

    fn band_count(&self) -> usize;

    fn transform(&self) -> GeoTransform;

    fn crs(&self) -> Option<CRS>;

    /// Declared no-data value of a band
    fn nodata(&self, band: usize) -> Option<f64>;

    /// Read one band's pixels inside `window`
    fn read_window(&mut self, band: usize, window: &PixelWindow) -> Result<Array2<f64>>;
}

impl RasterSource for Raster {
    fn description(&self) -> String {
        format!("in-memory raster {}x{}", self.cols(), self.rows())
    }

    fn shape(&self) -> (usize, usize) {
        Raster::shape(self)
    }

    fn band_count(&self) -> usize {
        Raster::band_count(self)
    }

    fn transform(&self) -> GeoTransform {
        *Raster::transform(self)
    }

    fn crs(&self) -> Option<CRS> {
        Raster::crs(self).cloned()
    }

    fn nodata(&self, _band: usize) -> Option<f64> {
        Raster::nodata(self)
    }

    fn read_window(&mut self, band: usize, window: &PixelWindow) -> Result<Array2<f64>> {
        self.window(band, window)
    }
}

/// An in-memory raster that remembers which file it was decoded from
#[derive(Debug, Clone)]
pub struct DecodedRaster {
    path: PathBuf,
    raster: Raster,
}

impl DecodedRaster {
    pub fn new(path: impl Into<PathBuf>, raster: Raster) -> Self {
        Self {
            path: path.into(),
            raster,
        }
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }
}

impl RasterSource for DecodedRaster {
    fn description(&self) -> String {
        self.path.display().to_string()
    }

    fn shape(&self) -> (usize, usize) {
        self.raster.shape()
    }

    fn band_count(&self) -> usize {
        self.raster.band_count()
    }

    fn transform(&self) -> GeoTransform {
        *self.raster.transform()
    }

    fn crs(&self) -> Option<CRS> {
        self.raster.crs().cloned()
    }

    fn nodata(&self, _band: usize) -> Option<f64> {
        self.raster.nodata()
    }

    fn read_window(&mut self, band: usize, window: &PixelWindow) -> Result<Array2<f64>> {
        self.raster.window(band, window)
    }
}

/// Open a raster file with the best available backend.
///
/// With the `gdal` feature every GDAL-readable format is accepted and windows
/// are read lazily. Otherwise only (Geo)TIFF is supported and the image is
/// decoded into memory.
pub fn open_raster(path: &Path) -> Result<Box<dyn RasterSource>> {
    #[cfg(feature = "gdal")]
    {
        Ok(Box::new(GdalRasterSource::open(path)?))
    }

    #[cfg(not(feature = "gdal"))]
    {
        match extension(path).as_deref() {
            Some("tif") | Some("tiff") => {
                let raster = read_geotiff(path)?;
                Ok(Box::new(DecodedRaster::new(path, raster)))
            }
            _ => Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: "only GeoTIFF is readable without the `gdal` feature".to_string(),
            }),
        }
    }
}

/// Vector formats recognized from a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFormat {
    GeoJson,
    Shapefile,
}

impl VectorFormat {
    pub fn detect(path: &Path) -> Result<Self> {
        match extension(path).as_deref() {
            Some("geojson") | Some("json") => Ok(VectorFormat::GeoJson),
            Some("shp") => Ok(VectorFormat::Shapefile),
            _ => Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: "expected a .geojson, .json or .shp file".to_string(),
            }),
        }
    }
}

/// A writable vector destination
pub trait VectorSink {
    /// Where the collection is written
    fn path(&self) -> &Path;

    /// Longest attribute name the format can store, if limited.
    /// Appended names are fitted to it by [`FieldNamer`].
    fn max_field_name_len(&self) -> Option<usize>;

    fn write(&self, collection: &FeatureCollection) -> Result<()>;
}

/// Load a vector file, dispatching on its format
pub fn read_vector(path: &Path) -> Result<FeatureCollection> {
    match VectorFormat::detect(path)? {
        VectorFormat::GeoJson => read_geojson(path),
        VectorFormat::Shapefile => Err(Error::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: "shapefile input is not supported; convert it to GeoJSON".to_string(),
        }),
    }
}

/// Pick the sink for an output path.
///
/// Shapefiles cannot store the appended attribute schema (nested time series,
/// 10-character names), so a `.shp` request falls back to GeoJSON next to it.
pub fn create_vector_sink(path: &Path) -> Result<Box<dyn VectorSink>> {
    match VectorFormat::detect(path)? {
        VectorFormat::GeoJson => Ok(Box::new(GeoJsonSink::new(path))),
        VectorFormat::Shapefile => {
            let fallback = path.with_extension("geojson");
            tracing::warn!(
                "Shapefile output cannot represent the statistics schema; writing GeoJSON to {}",
                fallback.display()
            );
            Ok(Box::new(GeoJsonSink::new(fallback)))
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
