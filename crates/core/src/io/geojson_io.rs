//! GeoJSON vector source and sink

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::io::VectorSink;
use crate::vector::{AttributeValue, Attributes, Feature, FeatureCollection};
use geojson::feature::Id;
use geojson::GeoJson;
use std::fs;
use std::path::{Path, PathBuf};

/// Read a GeoJSON FeatureCollection (or a single Feature).
///
/// The legacy `crs` member (`{"type": "name", "properties": {"name": ...}}`)
/// sets the collection CRS when present.
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::io_at(path, e))?;
    let parsed: GeoJson = text.parse()?;

    let (features, foreign_members) = match parsed {
        GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
        GeoJson::Feature(f) => (vec![f], None),
        GeoJson::Geometry(_) => {
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: "bare GeoJSON geometry has no features".to_string(),
            })
        }
    };

    let crs = foreign_members.as_ref().and_then(legacy_crs);

    let mut collection = FeatureCollection::new();
    collection.crs = crs;
    collection.foreign_members = foreign_members;

    for (index, f) in features.into_iter().enumerate() {
        let geometry = match f.geometry {
            Some(g) => Some(geo_types::Geometry::<f64>::try_from(g).map_err(|e| {
                Error::InvalidGeometry {
                    index,
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        let properties: Attributes = f
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, AttributeValue::from_json(v)))
            .collect();

        let id = f.id.map(|id| match id {
            Id::String(s) => serde_json::Value::String(s),
            Id::Number(n) => serde_json::Value::Number(n),
        });

        collection.push(Feature {
            geometry,
            properties,
            id,
        });
    }

    Ok(collection)
}

fn legacy_crs(members: &serde_json::Map<String, serde_json::Value>) -> Option<CRS> {
    let name = members
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    CRS::from_name(name)
}

fn to_geojson_feature(feature: &Feature) -> geojson::Feature {
    let geometry = feature
        .geometry
        .as_ref()
        .map(|g| geojson::Geometry::new(geojson::Value::from(g)));

    let properties: serde_json::Map<String, serde_json::Value> = feature
        .properties
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_json()))
        .collect();

    let id = feature.id.as_ref().and_then(|id| match id {
        serde_json::Value::String(s) => Some(Id::String(s.clone())),
        serde_json::Value::Number(n) => Some(Id::Number(n.clone())),
        _ => None,
    });

    geojson::Feature {
        bbox: None,
        geometry,
        id,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Serialize a collection as a GeoJSON FeatureCollection, overwriting `path`
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let path = path.as_ref();
    let fc = geojson::FeatureCollection {
        bbox: None,
        features: collection.iter().map(to_geojson_feature).collect(),
        foreign_members: collection.foreign_members.clone(),
    };
    let text = serde_json::to_string_pretty(&GeoJson::FeatureCollection(fc))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
    }
    fs::write(path, text).map_err(|e| Error::io_at(path, e))
}

/// GeoJSON output: no field-name limits, any JSON value
#[derive(Debug, Clone)]
pub struct GeoJsonSink {
    path: PathBuf,
}

impl GeoJsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl VectorSink for GeoJsonSink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn max_field_name_len(&self) -> Option<usize> {
        None
    }

    fn write(&self, collection: &FeatureCollection) -> Result<()> {
        write_geojson(collection, &self.path)
    }
}
