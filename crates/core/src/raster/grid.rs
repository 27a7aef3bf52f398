//! In-memory multi-band raster

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, PixelWindow};
use ndarray::{s, Array2};

/// A georeferenced raster held fully in memory.
///
/// Every band shares the same shape, transform and CRS. Values are stored as
/// `f64` regardless of the on-disk sample type.
///
/// # Example
///
/// ```ignore
/// use geozonal_core::Raster;
///
/// let mut raster = Raster::filled(100, 100, 0.0);
/// raster.set_nodata(Some(-9999.0));
/// let window = raster.window(0, &PixelWindow::new(10, 10, 5, 5))?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster {
    /// One array per band, row-major (row, col)
    bands: Vec<Array2<f64>>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<f64>,
}

impl Raster {
    /// Single-band raster filled with a value
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Single-band raster from row-major values
    pub fn from_vec(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Single-band raster from an ndarray
    pub fn from_array(data: Array2<f64>) -> Self {
        Self {
            bands: vec![data],
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Multi-band raster; all bands must share one shape
    pub fn from_bands(bands: Vec<Array2<f64>>) -> Result<Self> {
        let Some(first) = bands.first() else {
            return Err(Error::InvalidDimensions {
                width: 0,
                height: 0,
            });
        };
        let shape = first.dim();
        if let Some(bad) = bands.iter().find(|b| b.dim() != shape) {
            return Err(Error::Other(format!(
                "band shape {:?} differs from first band {:?}",
                bad.dim(),
                shape
            )));
        }
        Ok(Self {
            bands,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        })
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.bands[0].dim()
    }

    pub fn rows(&self) -> usize {
        self.shape().0
    }

    pub fn cols(&self) -> usize {
        self.shape().1
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Borrow a band (0-indexed)
    pub fn band(&self, band: usize) -> Result<&Array2<f64>> {
        self.bands.get(band).ok_or(Error::BandOutOfRange {
            band,
            count: self.bands.len(),
        })
    }

    /// Copy a window of one band (0-indexed)
    pub fn window(&self, band: usize, window: &PixelWindow) -> Result<Array2<f64>> {
        let data = self.band(band)?;
        let (rows, cols) = data.dim();
        if !window.fits((rows, cols)) {
            return Err(Error::WindowOutOfBounds {
                col_off: window.col_off,
                row_off: window.row_off,
                cols: window.cols,
                rows: window.rows,
                raster_cols: cols,
                raster_rows: rows,
            });
        }
        let r0 = window.row_off;
        let c0 = window.col_off;
        Ok(data
            .slice(s![r0..r0 + window.rows, c0..c0 + window.cols])
            .to_owned())
    }

    /// Set value at (row, col) of a band
    pub fn set(&mut self, band: usize, row: usize, col: usize, value: f64) -> Result<()> {
        let count = self.bands.len();
        let data = self
            .bands
            .get_mut(band)
            .ok_or(Error::BandOutOfRange { band, count })?;
        let (rows, cols) = data.dim();
        if row >= rows || col >= cols {
            return Err(Error::WindowOutOfBounds {
                col_off: col,
                row_off: row,
                cols: 1,
                rows: 1,
                raster_cols: cols,
                raster_rows: rows,
            });
        }
        data[(row, col)] = value;
        Ok(())
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Declared no-data value, shared by all bands
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<f64>) {
        self.nodata = nodata;
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }
}
