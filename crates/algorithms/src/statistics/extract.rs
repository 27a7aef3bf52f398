//! Per-feature extraction against one raster source

use crate::statistics::mask::{rasterize, PixelInclusion, PixelMask};
use crate::statistics::zonal::ZonalStats;
use geo::MultiPolygon;
use geozonal_core::io::RasterSource;
use geozonal_core::Result;

/// Identity of a raster grid; masks are reusable between equal grids
#[derive(Debug, Clone, PartialEq, Eq)]
struct GridKey {
    transform: [u64; 6],
    shape: (usize, usize),
    crs: Option<String>,
}

impl GridKey {
    fn of(source: &dyn RasterSource) -> Self {
        Self {
            transform: source.transform().to_gdal().map(f64::to_bits),
            shape: source.shape(),
            crs: source.crs().map(|c| c.identifier()),
        }
    }
}

/// Extraction settings
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    pub inclusion: PixelInclusion,
    /// Replaces the raster's declared nodata value for every band
    pub nodata: Option<f64>,
}

/// Computes statistics for every feature of a run against one raster at a time.
///
/// Masks are rasterized once per grid and kept while consecutive rasters
/// share it.
#[derive(Debug, Default)]
pub struct ZonalExtractor {
    options: ExtractOptions,
    grid: Option<GridKey>,
    masks: Vec<Option<PixelMask>>,
}

impl ZonalExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self {
            options,
            grid: None,
            masks: Vec::new(),
        }
    }

    /// Make masks for `geometries` (in the source's CRS) available.
    ///
    /// Returns `true` when the masks of the previous raster were reused.
    pub fn prepare(&mut self, source: &dyn RasterSource, geometries: &[MultiPolygon<f64>]) -> bool {
        let key = GridKey::of(source);
        if self.grid.as_ref() == Some(&key) && self.masks.len() == geometries.len() {
            return true;
        }

        let transform = source.transform();
        let shape = source.shape();
        self.masks = geometries
            .iter()
            .map(|g| rasterize(g, &transform, shape, self.options.inclusion))
            .collect();
        self.grid = Some(key);
        false
    }

    /// Nodata value applied to a band
    pub fn nodata_for(&self, source: &dyn RasterSource, band: usize) -> Option<f64> {
        self.options.nodata.or_else(|| source.nodata(band))
    }

    /// Statistics of feature `index` for every band of `source`.
    ///
    /// A feature outside the raster yields empty records; only read errors
    /// are returned as `Err`.
    pub fn extract(&self, source: &mut dyn RasterSource, index: usize) -> Result<Vec<ZonalStats>> {
        let bands = source.band_count();
        let Some(mask) = self.masks.get(index).and_then(Option::as_ref) else {
            return Ok(vec![ZonalStats::from_values(&[], 0); bands]);
        };

        let mut out = Vec::with_capacity(bands);
        for band in 0..bands {
            let nodata = self.nodata_for(&*source, band);
            let values = source.read_window(band, &mask.window)?;
            out.push(ZonalStats::from_masked(&values, &mask.mask, nodata));
        }
        Ok(out)
    }
}
