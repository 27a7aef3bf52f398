//! Windowed raster reads through GDAL

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::io::RasterSource;
use crate::raster::{GeoTransform, PixelWindow};
use gdal::raster::GdalDataType;
use gdal::Dataset;
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// A GDAL dataset read window by window, so only the pixels under a
/// feature's bounding box are ever loaded.
pub struct GdalRasterSource {
    path: PathBuf,
    dataset: Dataset,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Vec<Option<f64>>,
}

impl GdalRasterSource {
    pub fn open(path: &Path) -> Result<Self> {
        let dataset = Dataset::open(path)?;

        let transform = dataset
            .geo_transform()
            .map(GeoTransform::from_gdal)
            .unwrap_or_default();

        let crs = dataset.spatial_ref().ok().and_then(|srs| {
            if let Ok(code) = srs.auth_code() {
                Some(CRS::from_epsg(code as u32))
            } else {
                srs.to_wkt().ok().map(CRS::from_wkt)
            }
        });

        let count = dataset.raster_count() as usize;
        let mut nodata = Vec::with_capacity(count);
        for idx in 1..=count {
            let band = dataset.rasterband(idx as _)?;
            // stored as float32, so compare against the value the pixels carry
            let value = match band.band_type() {
                GdalDataType::Float32 => band.no_data_value().map(|v| v as f32 as f64),
                _ => band.no_data_value(),
            };
            nodata.push(value);
        }

        Ok(Self {
            path: path.to_path_buf(),
            dataset,
            transform,
            crs,
            nodata,
        })
    }
}

impl RasterSource for GdalRasterSource {
    fn description(&self) -> String {
        self.path.display().to_string()
    }

    fn shape(&self) -> (usize, usize) {
        let (cols, rows) = self.dataset.raster_size();
        (rows as usize, cols as usize)
    }

    fn band_count(&self) -> usize {
        self.nodata.len()
    }

    fn transform(&self) -> GeoTransform {
        self.transform
    }

    fn crs(&self) -> Option<CRS> {
        self.crs.clone()
    }

    fn nodata(&self, band: usize) -> Option<f64> {
        self.nodata.get(band).copied().flatten()
    }

    fn read_window(&mut self, band: usize, window: &PixelWindow) -> Result<Array2<f64>> {
        if band >= self.nodata.len() {
            return Err(Error::BandOutOfRange {
                band,
                count: self.nodata.len(),
            });
        }
        let rasterband = self.dataset.rasterband((band + 1) as _)?;
        let buffer = rasterband.read_as::<f64>(
            (window.col_off as isize, window.row_off as isize),
            (window.cols, window.rows),
            (window.cols, window.rows),
            None,
        )?;
        Array2::from_shape_vec(window.shape(), buffer.data().to_vec())
            .map_err(|e| Error::Other(e.to_string()))
    }
}
