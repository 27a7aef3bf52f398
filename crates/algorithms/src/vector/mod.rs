//! Geometry preprocessing
//!
//! Operations applied to feature geometries before masking:
//! - Simplify: Douglas-Peucker, optionally topology-preserving
//! - Validity: structural checks for polygonal output
//! - Reproject: vector CRS to raster CRS via proj4rs

mod reproject;
mod simplify;
mod validity;

pub use reproject::ProjectionContext;
pub use simplify::{simplify_polygonal, SimplifyFailure, SimplifyParams};
pub use validity::{check_multipolygon, InvalidReason};
