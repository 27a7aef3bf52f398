//! Feature loading: geometry checks, identifiers, simplification

use crate::vector::{simplify_polygonal, SimplifyParams};
use geo::{Geometry, MultiPolygon};
use geozonal_core::io::sanitize_file_stem;
use geozonal_core::vector::{AttributeValue, FeatureCollection};
use geozonal_core::{Error, Result, CRS};
use std::collections::HashMap;

/// Features of a run, ready for masking
#[derive(Debug, Clone)]
pub struct PreparedFeatures {
    /// The input collection; geometries are replaced by their simplified form
    pub collection: FeatureCollection,
    /// Stable id per feature, the join key across rasters
    pub ids: Vec<String>,
    /// Polygonal geometry per feature, in `crs`
    pub geometries: Vec<MultiPolygon<f64>>,
    pub crs: CRS,
    /// Features whose simplification failed and kept their original geometry
    pub simplify_fallbacks: Vec<usize>,
}

impl PreparedFeatures {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// The polygonal geometry of feature `index`
pub fn polygonal(index: usize, geometry: Option<&Geometry<f64>>) -> Result<MultiPolygon<f64>> {
    match geometry {
        Some(Geometry::Polygon(p)) => Ok(MultiPolygon::new(vec![p.clone()])),
        Some(Geometry::MultiPolygon(mp)) => Ok(mp.clone()),
        Some(other) => Err(Error::InvalidGeometry {
            index,
            reason: format!("expected a polygon or multipolygon, found {}", geometry_kind(other)),
        }),
        None => Err(Error::InvalidGeometry {
            index,
            reason: "feature has no geometry".to_string(),
        }),
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

fn id_string(value: &AttributeValue) -> Option<String> {
    match value {
        AttributeValue::Null => None,
        AttributeValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Resolve one unique id per feature.
///
/// With `id_field`, values are stringified; a field absent from every
/// feature falls back to `feature_<index>`, a field missing on some features
/// is an error. Duplicate ids are an error naming both features.
pub fn resolve_ids(collection: &FeatureCollection, id_field: Option<&str>) -> Result<Vec<String>> {
    let positional = || -> Vec<String> {
        (0..collection.len()).map(|i| format!("feature_{}", i)).collect()
    };

    let ids = match id_field {
        None => positional(),
        Some(field) => {
            let values: Vec<Option<String>> = collection
                .iter()
                .map(|f| f.get_property(field).and_then(id_string))
                .collect();
            if values.iter().all(Option::is_none) {
                tracing::warn!("Id field '{}' not found on any feature; using positional ids", field);
                positional()
            } else {
                let mut ids = Vec::with_capacity(values.len());
                for (index, value) in values.into_iter().enumerate() {
                    ids.push(value.ok_or_else(|| {
                        Error::Config(format!("feature {} has no value for id field '{}'", index, field))
                    })?);
                }
                ids
            }
        }
    };

    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(ids.len());
    for (index, id) in ids.iter().enumerate() {
        if let Some(&first) = seen.get(id.as_str()) {
            return Err(Error::DuplicateId {
                id: id.clone(),
                first,
                second: index,
            });
        }
        seen.insert(id.as_str(), index);
    }
    Ok(ids)
}

/// Per-feature table file names must stay distinct after sanitizing
pub fn check_table_names(ids: &[String]) -> Result<()> {
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(ids.len());
    for (index, id) in ids.iter().enumerate() {
        let stem = sanitize_file_stem(id);
        if let Some(&first) = seen.get(&stem) {
            return Err(Error::Config(format!(
                "feature ids '{}' (feature {}) and '{}' (feature {}) both map to table file '{}.csv'",
                ids[first], first, id, index, stem
            )));
        }
        seen.insert(stem, index);
    }
    Ok(())
}

/// Validate, identify and (optionally) simplify the features of `collection`.
///
/// Simplification runs in the collection's own CRS, before any
/// reprojection; a failure keeps the original geometry and is reported.
pub fn prepare_features(
    mut collection: FeatureCollection,
    crs: CRS,
    id_field: Option<&str>,
    simplify: Option<&SimplifyParams>,
) -> Result<PreparedFeatures> {
    let ids = resolve_ids(&collection, id_field)?;

    let mut geometries = Vec::with_capacity(collection.len());
    let mut simplify_fallbacks = Vec::new();

    for (index, feature) in collection.features.iter_mut().enumerate() {
        let original = polygonal(index, feature.geometry.as_ref())?;

        let Some(params) = simplify else {
            geometries.push(original);
            continue;
        };
        let Some(geometry) = feature.geometry.as_ref() else {
            geometries.push(original);
            continue;
        };
        match simplify_polygonal(geometry, params) {
            Ok(simplified) => {
                geometries.push(polygonal(index, Some(&simplified))?);
                feature.geometry = Some(simplified);
            }
            Err(failure) => {
                tracing::warn!(
                    "Feature {} ('{}'): simplification failed ({}); keeping original geometry",
                    index,
                    ids[index],
                    failure
                );
                simplify_fallbacks.push(index);
                geometries.push(original);
            }
        }
    }

    Ok(PreparedFeatures {
        collection,
        ids,
        geometries,
        crs,
        simplify_fallbacks,
    })
}
