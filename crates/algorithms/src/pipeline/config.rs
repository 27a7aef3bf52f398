//! Run configuration

use crate::temporal::{DatePattern, Reducer, DEFAULT_DATE_FORMAT, DEFAULT_DATE_PATTERN};
use geozonal_core::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory for per-feature tables when none is configured, next to the output
pub const DEFAULT_CSV_DIR: &str = "timeseries_csv";

/// Everything a zonal statistics run needs.
///
/// Deserializable from JSON; `raster_paths` accepts a single string or a list
/// of paths and glob patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub geometry_path: PathBuf,
    #[serde(deserialize_with = "one_or_many")]
    pub raster_paths: Vec<String>,
    pub output_path: PathBuf,
    pub export_csv: bool,
    pub csv_dir: Option<PathBuf>,
    /// Attribute holding the stable feature id; positional when unset
    pub id_field: Option<String>,
    pub simplify_tolerance: Option<f64>,
    pub preserve_topology: bool,
    pub all_touched: bool,
    pub band_names: Vec<String>,
    /// Overrides the nodata value declared by the rasters
    pub nodata: Option<f64>,
    /// Overrides the CRS declared by the vector file
    pub geometry_epsg: Option<u32>,
    pub reducer: Reducer,
    pub embed_timeseries: bool,
    pub date_pattern: String,
    pub date_format: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            geometry_path: PathBuf::new(),
            raster_paths: Vec::new(),
            output_path: PathBuf::new(),
            export_csv: false,
            csv_dir: None,
            id_field: None,
            simplify_tolerance: None,
            preserve_topology: true,
            all_touched: false,
            band_names: Vec::new(),
            nodata: None,
            geometry_epsg: None,
            reducer: Reducer::Last,
            embed_timeseries: false,
            date_pattern: DEFAULT_DATE_PATTERN.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(path) => vec![path],
        OneOrMany::Many(paths) => paths,
    })
}

impl RunConfig {
    /// Read a configuration file (JSON)
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io_at(path, e))?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Check every option before any input is opened
    pub fn validate(&self) -> Result<()> {
        if self.geometry_path.as_os_str().is_empty() {
            return Err(Error::Config("geometry_path is required".to_string()));
        }
        if self.raster_paths.iter().all(|p| p.trim().is_empty()) {
            return Err(Error::Config("at least one raster path is required".to_string()));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(Error::Config("output_path is required".to_string()));
        }

        if let Some(tolerance) = self.simplify_tolerance {
            if !tolerance.is_finite() || tolerance <= 0.0 {
                return Err(Error::InvalidParameter {
                    name: "simplify_tolerance",
                    value: tolerance.to_string(),
                    reason: "must be a positive number".to_string(),
                });
            }
        }

        if let Some(nodata) = self.nodata {
            if nodata.is_infinite() {
                return Err(Error::InvalidParameter {
                    name: "nodata",
                    value: nodata.to_string(),
                    reason: "infinite values are always excluded".to_string(),
                });
            }
        }

        for (i, name) in self.band_names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(Error::InvalidParameter {
                    name: "band_names",
                    value: format!("#{}", i + 1),
                    reason: "band names must not be empty".to_string(),
                });
            }
            if self.band_names[..i].contains(name) {
                return Err(Error::InvalidParameter {
                    name: "band_names",
                    value: name.clone(),
                    reason: "band names must be unique".to_string(),
                });
            }
        }

        if matches!(self.id_field.as_deref(), Some(f) if f.trim().is_empty()) {
            return Err(Error::InvalidParameter {
                name: "id_field",
                value: String::new(),
                reason: "must name an attribute".to_string(),
            });
        }

        self.date_pattern()?;
        Ok(())
    }

    pub fn date_pattern(&self) -> Result<DatePattern> {
        DatePattern::new(&self.date_pattern, &self.date_format)
    }

    /// Directory receiving per-feature tables
    pub fn csv_directory(&self) -> PathBuf {
        match &self.csv_dir {
            Some(dir) => dir.clone(),
            None => self
                .output_path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(DEFAULT_CSV_DIR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> RunConfig {
        RunConfig {
            geometry_path: "zones.geojson".into(),
            raster_paths: vec!["ndvi_*.tif".into()],
            output_path: "out/zones_stats.geojson".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let c = RunConfig::default();
        assert!(c.preserve_topology);
        assert!(!c.all_touched);
        assert_eq!(c.reducer, Reducer::Last);
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn test_json_single_raster_string() {
        let c: RunConfig = serde_json::from_str(
            r#"{"geometry_path": "a.geojson", "raster_paths": "x.tif", "output_path": "o.geojson",
                "reducer": "mean", "simplify_tolerance": 0.5}"#,
        )
        .unwrap();
        assert_eq!(c.raster_paths, vec!["x.tif".to_string()]);
        assert_eq!(c.reducer, Reducer::Mean);
        assert!(c.preserve_topology);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_unknown_option_rejected() {
        let parsed: std::result::Result<RunConfig, _> =
            serde_json::from_str(r#"{"geometry_path": "a.geojson", "tolerance": 1}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_invalid_values() {
        let mut c = minimal();
        c.simplify_tolerance = Some(-1.0);
        assert!(c.validate().is_err());

        let mut c = minimal();
        c.simplify_tolerance = Some(f64::NAN);
        assert!(c.validate().is_err());

        let mut c = minimal();
        c.band_names = vec!["red".into(), "red".into()];
        assert!(c.validate().is_err());

        let mut c = minimal();
        c.date_pattern = r"\d{8}".into();
        assert!(c.validate().is_err());

        let mut c = minimal();
        c.raster_paths.clear();
        assert!(matches!(c.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_csv_directory() {
        let c = minimal();
        assert_eq!(c.csv_directory(), PathBuf::from("out/timeseries_csv"));
        let c = RunConfig {
            csv_dir: Some("tables".into()),
            ..minimal()
        };
        assert_eq!(c.csv_directory(), PathBuf::from("tables"));
    }
}
