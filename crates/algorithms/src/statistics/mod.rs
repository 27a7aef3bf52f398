//! Zonal extraction
//!
//! - **mask**: rasterize a geometry onto a raster window
//! - **zonal**: statistics record over masked pixels
//! - **extract**: per-feature, per-band extraction with mask reuse

pub mod extract;
pub mod mask;
pub mod zonal;

pub use extract::{ExtractOptions, ZonalExtractor};
pub use mask::{rasterize, PixelInclusion, PixelMask};
pub use zonal::{is_valid, ZonalStatistic, ZonalStats};
