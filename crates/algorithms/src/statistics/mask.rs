//! Rasterization of feature geometry onto a raster grid

use geo::{BoundingRect, Contains, Intersects, MultiPolygon, Point, Polygon};
use geozonal_core::{GeoTransform, PixelWindow};
use ndarray::Array2;

/// Which pixels a geometry selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelInclusion {
    /// Pixel center strictly inside the geometry
    #[default]
    Center,
    /// Any overlap between the pixel square and the geometry
    AllTouched,
}

impl PixelInclusion {
    pub fn from_all_touched(all_touched: bool) -> Self {
        if all_touched {
            PixelInclusion::AllTouched
        } else {
            PixelInclusion::Center
        }
    }
}

/// Boolean mask over the window of a raster that a feature's bounding box covers
#[derive(Debug, Clone, PartialEq)]
pub struct PixelMask {
    pub window: PixelWindow,
    pub mask: Array2<bool>,
}

impl PixelMask {
    /// Number of selected pixels
    pub fn selected(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }
}

/// Rasterize `geometry` (already in the raster's CRS) onto a grid of
/// `shape = (rows, cols)`.
///
/// Returns `None` when the geometry's bounding box does not overlap the grid.
/// A returned mask may still select no pixel.
pub fn rasterize(
    geometry: &MultiPolygon<f64>,
    transform: &GeoTransform,
    shape: (usize, usize),
    inclusion: PixelInclusion,
) -> Option<PixelMask> {
    let bbox = geometry.bounding_rect()?;
    let window = transform.window_for_bounds(bbox.min().x, bbox.min().y, bbox.max().x, bbox.max().y, shape)?;

    let mask = Array2::from_shape_fn(window.shape(), |(r, c)| {
        let col = window.col_off + c;
        let row = window.row_off + r;
        match inclusion {
            PixelInclusion::Center => {
                let (x, y) = transform.pixel_to_geo(col, row);
                geometry.contains(&Point::new(x, y))
            }
            PixelInclusion::AllTouched => {
                let corners = transform.pixel_corners(col, row);
                let square = Polygon::new(corners.to_vec().into(), vec![]);
                geometry.intersects(&square)
            }
        }
    });

    Some(PixelMask { window, mask })
}
