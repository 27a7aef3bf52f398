//! Raster data structures: georeferencing, pixel windows and in-memory grids

mod geotransform;
mod grid;
mod window;

pub use geotransform::GeoTransform;
pub use grid::Raster;
pub use window::PixelWindow;
