//! Geometry reprojection with proj4rs
//!
//! PROJ definitions come from [`CRS::proj4`] (explicit PROJ strings or the
//! crs-definitions EPSG database). Parsed projections are cached for the
//! lifetime of a [`ProjectionContext`], which a run creates once and drops at
//! the end.

use geo::{Coord, Geometry, MapCoords};
use geozonal_core::{Error, Result, CRS};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use std::collections::HashMap;

/// Run-scoped cache of parsed projections, keyed by CRS identifier
#[derive(Default)]
pub struct ProjectionContext {
    projections: HashMap<String, (Proj, bool)>,
}

impl std::fmt::Debug for ProjectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionContext")
            .field("cached", &self.projections.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProjectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(&mut self, crs: &CRS) -> Result<String> {
        let key = crs.identifier();
        if !self.projections.contains_key(&key) {
            let definition = crs
                .proj4()
                .ok_or_else(|| Error::UndefinedCrs(crs.identifier()))?;
            let proj = Proj::from_proj_string(definition).map_err(|e| {
                Error::UndefinedCrs(format!("{}: invalid PROJ definition ({:?})", key, e))
            })?;
            tracing::debug!("Loaded projection {}", key);
            self.projections.insert(key.clone(), (proj, crs.is_geographic()));
        }
        Ok(key)
    }

    /// Transform every coordinate of `geometry` from `from` to `to`.
    ///
    /// Geographic coordinates are degrees on both sides. A coordinate that
    /// fails to transform, or transforms to a non-finite value, aborts with
    /// [`Error::Reprojection`].
    pub fn reproject(&mut self, geometry: &Geometry<f64>, from: &CRS, to: &CRS) -> Result<Geometry<f64>> {
        if from.is_equivalent(to) {
            return Ok(geometry.clone());
        }

        let src_key = self.load(from)?;
        let dst_key = self.load(to)?;
        let (src, src_geographic) = self
            .projections
            .get(&src_key)
            .ok_or_else(|| Error::UndefinedCrs(src_key.clone()))?;
        let (dst, dst_geographic) = self
            .projections
            .get(&dst_key)
            .ok_or_else(|| Error::UndefinedCrs(dst_key.clone()))?;
        let (src_geographic, dst_geographic) = (*src_geographic, *dst_geographic);
        let (src_name, dst_name) = (src_key.as_str(), dst_key.as_str());

        geometry.try_map_coords(|c: Coord<f64>| {
            let failure = |reason: String| Error::Reprojection {
                source_crs: src_name.to_string(),
                target_crs: dst_name.to_string(),
                x: c.x,
                y: c.y,
                reason,
            };

            let mut point = if src_geographic {
                (c.x.to_radians(), c.y.to_radians(), 0.0)
            } else {
                (c.x, c.y, 0.0)
            };
            transform(src, dst, &mut point).map_err(|e| failure(format!("{:?}", e)))?;

            let (x, y) = if dst_geographic {
                (point.0.to_degrees(), point.1.to_degrees())
            } else {
                (point.0, point.1)
            };
            if !x.is_finite() || !y.is_finite() {
                return Err(failure("non-finite result".to_string()));
            }
            Ok(Coord { x, y })
        })
    }
}
