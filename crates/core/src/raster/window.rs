//! Rectangular pixel windows into a raster grid

use serde::{Deserialize, Serialize};

/// A rectangular block of pixels, addressed by its upper-left offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub cols: usize,
    pub rows: usize,
}

impl PixelWindow {
    pub fn new(col_off: usize, row_off: usize, cols: usize, rows: usize) -> Self {
        Self {
            col_off,
            row_off,
            cols,
            rows,
        }
    }

    /// Window covering a whole raster of the given shape `(rows, cols)`
    pub fn full(shape: (usize, usize)) -> Self {
        Self::new(0, 0, shape.1, shape.0)
    }

    /// Build a window from fractional pixel bounds, clamped to a raster of
    /// `(rows, cols)`. Returns `None` when nothing of the bounds falls on the grid.
    ///
    /// The window includes every pixel the bounds touch.
    pub fn from_pixel_bounds(
        col_min: f64,
        row_min: f64,
        col_max: f64,
        row_max: f64,
        shape: (usize, usize),
    ) -> Option<Self> {
        let (rows, cols) = shape;
        if !(col_min.is_finite() && row_min.is_finite() && col_max.is_finite() && row_max.is_finite())
        {
            return None;
        }

        let c0 = col_min.floor().max(0.0);
        let r0 = row_min.floor().max(0.0);
        let c1 = col_max.ceil().min(cols as f64);
        let r1 = row_max.ceil().min(rows as f64);

        if c1 <= c0 || r1 <= r0 {
            return None;
        }

        Some(Self::new(
            c0 as usize,
            r0 as usize,
            (c1 - c0) as usize,
            (r1 - r0) as usize,
        ))
    }

    /// Shape as `(rows, cols)`, matching ndarray conventions
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Whether the window lies inside a raster of `(rows, cols)`
    pub fn fits(&self, shape: (usize, usize)) -> bool {
        self.row_off + self.rows <= shape.0 && self.col_off + self.cols <= shape.1
    }
}
