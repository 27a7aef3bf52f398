//! Polygon simplification
//!
//! - Fast mode: Douglas-Peucker per ring; rings that collapse are dropped,
//!   validity is not guaranteed.
//! - Topology-preserving mode: Douglas-Peucker per ring, accepted only if the
//!   result passes [`check_multipolygon`]; otherwise the tolerance is halved
//!   and the simplification retried.

use crate::vector::validity::check_multipolygon;
use geo::{Geometry, LineString, MultiPolygon, Polygon, Simplify};

/// Attempts made by the topology-preserving mode before giving up
const MAX_PRESERVE_ATTEMPTS: usize = 8;

/// Parameters for simplification
#[derive(Debug, Clone)]
pub struct SimplifyParams {
    /// Maximum vertex deviation, in the geometry's CRS units
    pub tolerance: f64,
    /// Guarantee no self-intersections and unchanged polygon/hole counts
    pub preserve_topology: bool,
}

impl Default for SimplifyParams {
    fn default() -> Self {
        Self {
            tolerance: 1.0,
            preserve_topology: true,
        }
    }
}

/// Why a geometry was left unsimplified
#[derive(Debug, Clone, PartialEq)]
pub enum SimplifyFailure {
    /// Every part collapsed below a valid ring
    Collapsed,
    /// No tolerance down to `tolerance / 2^(attempts-1)` produced a valid result
    NoValidResult { last_reason: String },
    /// Only polygonal geometries are simplified
    NotPolygonal,
}

impl std::fmt::Display for SimplifyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimplifyFailure::Collapsed => write!(f, "geometry collapsed to empty"),
            SimplifyFailure::NoValidResult { last_reason } => {
                write!(f, "no valid simplification found ({})", last_reason)
            }
            SimplifyFailure::NotPolygonal => write!(f, "geometry is not polygonal"),
        }
    }
}

fn simplify_polygon_dp(polygon: &Polygon<f64>, tolerance: f64, keep_rings: bool) -> Polygon<f64> {
    let exterior = polygon.exterior().simplify(&tolerance);
    let interiors: Vec<LineString<f64>> = polygon
        .interiors()
        .iter()
        .map(|ring| ring.simplify(&tolerance))
        .filter(|ring| keep_rings || ring.0.len() >= 4) // Must remain valid ring
        .collect();
    Polygon::new(exterior, interiors)
}

fn simplify_fast(mp: &MultiPolygon<f64>, tolerance: f64) -> Result<MultiPolygon<f64>, SimplifyFailure> {
    let parts: Vec<Polygon<f64>> = mp
        .0
        .iter()
        .map(|p| simplify_polygon_dp(p, tolerance, false))
        .filter(|p| p.exterior().0.len() >= 4)
        .collect();
    if parts.is_empty() {
        return Err(SimplifyFailure::Collapsed);
    }
    Ok(MultiPolygon::new(parts))
}

fn simplify_preserving(
    mp: &MultiPolygon<f64>,
    tolerance: f64,
) -> Result<MultiPolygon<f64>, SimplifyFailure> {
    let mut tol = tolerance;
    let mut last_reason = String::new();
    for _ in 0..MAX_PRESERVE_ATTEMPTS {
        let candidate = MultiPolygon::new(
            mp.0.iter()
                .map(|p| simplify_polygon_dp(p, tol, true))
                .collect(),
        );
        match check_multipolygon(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(reason) => last_reason = reason.to_string(),
        }
        tol /= 2.0;
    }
    Err(SimplifyFailure::NoValidResult { last_reason })
}

/// Simplify a polygonal geometry (Polygon or MultiPolygon).
///
/// The output keeps the input's geometry type. On failure the caller keeps
/// the original geometry.
pub fn simplify_polygonal(
    geom: &Geometry<f64>,
    params: &SimplifyParams,
) -> Result<Geometry<f64>, SimplifyFailure> {
    let (mp, single) = match geom {
        Geometry::Polygon(p) => (MultiPolygon::new(vec![p.clone()]), true),
        Geometry::MultiPolygon(mp) => (mp.clone(), false),
        _ => return Err(SimplifyFailure::NotPolygonal),
    };

    let simplified = if params.preserve_topology {
        simplify_preserving(&mp, params.tolerance)?
    } else {
        simplify_fast(&mp, params.tolerance)?
    };

    if single && simplified.0.len() == 1 {
        let mut parts = simplified.0;
        if let Some(p) = parts.pop() {
            return Ok(Geometry::Polygon(p));
        }
        return Err(SimplifyFailure::Collapsed);
    }
    Ok(Geometry::MultiPolygon(simplified))
}
