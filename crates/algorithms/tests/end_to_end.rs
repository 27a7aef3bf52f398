//! End-to-end runs against GeoTIFF and GeoJSON fixtures written to temp dirs

use approx::assert_relative_eq;
use geozonal_algorithms::pipeline::{run, RunConfig};
use geozonal_algorithms::temporal::Reducer;
use geozonal_core::io::{read_geojson, write_geotiff, GeoTiffOptions};
use geozonal_core::vector::{AttributeValue, Feature, FeatureCollection};
use geozonal_core::{Error, GeoTransform, Raster, CRS};
use ndarray::Array2;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const UTM_33N: u32 = 32633;

/// 2x2 (or larger) UTM raster with 10 m pixels whose upper-left corner is (500000, 5000020)
fn write_raster(dir: &Path, name: &str, values: &[f64], rows: usize, cols: usize, nodata: Option<f64>) -> PathBuf {
    let mut raster = Raster::from_vec(values.to_vec(), rows, cols).unwrap();
    raster.set_transform(GeoTransform::new(500_000.0, 5_000_000.0 + 10.0 * rows as f64, 10.0, -10.0));
    raster.set_crs(Some(CRS::from_epsg(UTM_33N)));
    raster.set_nodata(nodata);
    let path = dir.join(name);
    write_geotiff(&raster, &path, Some(GeoTiffOptions { write_crs: true })).unwrap();
    path
}

fn ring(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> String {
    format!(
        "[[[{min_x},{min_y}],[{max_x},{min_y}],[{max_x},{max_y}],[{min_x},{max_y}],[{min_x},{min_y}]]]"
    )
}

/// Features as (properties JSON, polygon rings JSON), with a legacy `crs` member
fn write_features(dir: &Path, crs: &str, features: &[(&str, String)]) -> PathBuf {
    let body: Vec<String> = features
        .iter()
        .map(|(props, coords)| {
            format!(
                r#"{{"type":"Feature","properties":{props},"geometry":{{"type":"Polygon","coordinates":{coords}}}}}"#
            )
        })
        .collect();
    let text = format!(
        r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"{crs}"}}}},"features":[{}]}}"#,
        body.join(",")
    );
    let path = dir.join("zones.geojson");
    fs::write(&path, text).unwrap();
    path
}

fn covering() -> String {
    ring(499_990.0, 4_999_990.0, 500_030.0, 5_000_030.0)
}

fn outside() -> String {
    ring(600_000.0, 4_000_000.0, 600_100.0, 4_000_100.0)
}

fn config(dir: &TempDir, geometry: PathBuf, rasters: Vec<String>) -> RunConfig {
    RunConfig {
        geometry_path: geometry,
        raster_paths: rasters,
        output_path: dir.path().join("out/zones_stats.geojson"),
        ..Default::default()
    }
}

fn path_string(p: &Path) -> String {
    p.display().to_string()
}

fn output(config: &RunConfig) -> FeatureCollection {
    read_geojson(&config.output_path).unwrap()
}

fn number(feature: &Feature, key: &str) -> f64 {
    match feature.get_property(key) {
        Some(AttributeValue::Float(v)) => *v,
        Some(AttributeValue::Int(v)) => *v as f64,
        other => panic!("{key} is not a number: {other:?}"),
    }
}

#[test]
fn single_raster_block_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let raster = write_raster(dir.path(), "mosaic.tif", &[1.0, 2.0, 3.0, 4.0], 2, 2, None);
    let geometry = write_features(
        dir.path(),
        "urn:ogc:def:crs:EPSG::32633",
        &[(r#"{"name":"block","area_ha":0.04}"#, covering())],
    );
    let cfg = config(&dir, geometry, vec![path_string(&raster)]);

    let summary = run(&cfg).unwrap();
    assert_eq!(summary.rasters_processed, 1);
    assert!(summary.rasters_failed.is_empty());

    let out = output(&cfg);
    let f = &out.features[0];
    assert_relative_eq!(number(f, "mean"), 2.5);
    assert_relative_eq!(number(f, "min"), 1.0);
    assert_relative_eq!(number(f, "max"), 4.0);
    assert_relative_eq!(number(f, "sum"), 10.0);
    assert_eq!(f.get_property("count"), Some(&AttributeValue::Int(4)));
    assert_eq!(f.get_property("date"), None);

    // Original attributes come first and are untouched
    let keys: Vec<&str> = f.properties.keys().collect();
    assert_eq!(&keys[..3], &["name", "area_ha", "count"]);
    assert_eq!(f.get_property("name"), Some(&AttributeValue::String("block".into())));

    // The input's CRS declaration is carried through
    assert_eq!(out.crs, Some(CRS::from_epsg(UTM_33N)));
}

#[test]
fn time_series_tables_are_sorted_by_date() {
    let dir = tempfile::tempdir().unwrap();
    write_raster(dir.path(), "ndvi_20220601.tif", &[5.0; 4], 2, 2, None);
    write_raster(dir.path(), "ndvi_20220101.tif", &[1.0, 2.0, 3.0, 4.0], 2, 2, None);
    let geometry = write_features(
        dir.path(),
        "EPSG:32633",
        &[(r#"{"parcel":"P-1"}"#, covering())],
    );
    let mut cfg = config(&dir, geometry, vec![format!("{}/ndvi_*.tif", dir.path().display())]);
    cfg.export_csv = true;
    cfg.id_field = Some("parcel".into());

    let summary = run(&cfg).unwrap();
    assert_eq!(summary.rasters_processed, 2);

    let csv = fs::read_to_string(dir.path().join("out/timeseries_csv/P-1.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "date,count,sum,mean,min,max,std,pixels,nodata");
    assert!(lines[1].starts_with("2022-01-01,4,10,2.5,1,4,"), "{}", lines[1]);
    assert!(lines[2].starts_with("2022-06-01,4,20,5,5,5,0,"), "{}", lines[2]);

    // Default reducer keeps the latest acquisition
    let out = output(&cfg);
    let f = &out.features[0];
    assert_eq!(f.get_property("date"), Some(&AttributeValue::String("2022-06-01".into())));
    assert_relative_eq!(number(f, "mean"), 5.0);
    assert_eq!(f.get_property("timeseries"), None);
}

#[test]
fn nodata_pixels_are_excluded() {
    let dir = tempfile::tempdir().unwrap();
    let raster = write_raster(dir.path(), "scene.tif", &[-9999.0, -9999.0, 5.0, 7.0], 2, 2, Some(-9999.0));
    let geometry = write_features(dir.path(), "EPSG:32633", &[("{}", covering())]);
    let cfg = config(&dir, geometry, vec![path_string(&raster)]);

    run(&cfg).unwrap();
    let out = output(&cfg);
    let f = &out.features[0];
    assert_eq!(f.get_property("count"), Some(&AttributeValue::Int(2)));
    assert_eq!(f.get_property("nodata"), Some(&AttributeValue::Int(2)));
    assert_relative_eq!(number(f, "mean"), 6.0);
    assert_relative_eq!(number(f, "min"), 5.0);
}

#[test]
fn fractional_nodata_is_excluded() {
    let dir = tempfile::tempdir().unwrap();
    let raster = write_raster(dir.path(), "scene.tif", &[0.1, 0.1, 5.0, 7.0], 2, 2, Some(0.1));
    let geometry = write_features(dir.path(), "EPSG:32633", &[("{}", covering())]);
    let cfg = config(&dir, geometry, vec![path_string(&raster)]);

    run(&cfg).unwrap();
    let f = &output(&cfg).features[0];
    assert_eq!(f.get_property("count"), Some(&AttributeValue::Int(2)));
    assert_eq!(f.get_property("nodata"), Some(&AttributeValue::Int(2)));
    assert_relative_eq!(number(f, "mean"), 6.0);
}

#[test]
fn nodata_override_replaces_declared_value() {
    let dir = tempfile::tempdir().unwrap();
    let raster = write_raster(dir.path(), "scene.tif", &[0.0, 0.0, 5.0, 7.0], 2, 2, None);
    let geometry = write_features(dir.path(), "EPSG:32633", &[("{}", covering())]);
    let mut cfg = config(&dir, geometry, vec![path_string(&raster)]);
    cfg.nodata = Some(0.0);

    run(&cfg).unwrap();
    assert_relative_eq!(number(&output(&cfg).features[0], "mean"), 6.0);
}

#[test]
fn duplicate_ids_abort_before_any_raster_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let geometry = write_features(
        dir.path(),
        "EPSG:32633",
        &[
            (r#"{"parcel":7}"#, covering()),
            (r#"{"parcel":8}"#, outside()),
            (r#"{"parcel":7}"#, outside()),
        ],
    );
    // The raster does not exist: reaching it would be a different error
    let mut cfg = config(&dir, geometry, vec![path_string(&dir.path().join("missing.tif"))]);
    cfg.id_field = Some("parcel".into());

    match run(&cfg).unwrap_err() {
        Error::DuplicateId { id, first, second } => {
            assert_eq!(id, "7");
            assert_eq!((first, second), (0, 2));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!cfg.output_path.exists());
}

#[test]
fn feature_outside_extent_has_null_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let raster = write_raster(dir.path(), "scene.tif", &[1.0; 4], 2, 2, None);
    let geometry = write_features(
        dir.path(),
        "EPSG:32633",
        &[("{}", covering()), ("{}", outside())],
    );
    let cfg = config(&dir, geometry, vec![path_string(&raster)]);

    let summary = run(&cfg).unwrap();
    assert_eq!(summary.empty_features, vec![("scene.tif".to_string(), 1)]);

    let out = output(&cfg);
    let f = &out.features[1];
    assert_eq!(f.get_property("count"), Some(&AttributeValue::Int(0)));
    for key in ["sum", "mean", "min", "max", "std"] {
        assert_eq!(f.get_property(key), Some(&AttributeValue::Null), "{key}");
    }
}

#[test]
fn uniform_window_has_zero_spread() {
    let dir = tempfile::tempdir().unwrap();
    let raster = write_raster(dir.path(), "flat.tif", &[3.5; 9], 3, 3, None);
    let geometry = write_features(
        dir.path(),
        "EPSG:32633",
        &[("{}", ring(499_990.0, 4_999_990.0, 500_040.0, 5_000_040.0))],
    );
    let cfg = config(&dir, geometry, vec![path_string(&raster)]);

    run(&cfg).unwrap();
    let f = &output(&cfg).features[0];
    assert_eq!(f.get_property("count"), Some(&AttributeValue::Int(9)));
    assert_relative_eq!(number(f, "mean"), 3.5);
    assert_relative_eq!(number(f, "min"), 3.5);
    assert_relative_eq!(number(f, "max"), 3.5);
    assert_relative_eq!(number(f, "std"), 0.0);
}

#[test]
fn rerun_produces_identical_outputs() {
    let dir = tempfile::tempdir().unwrap();
    write_raster(dir.path(), "b_2022-03-01.tif", &[1.0, 2.0, 3.0, 4.0], 2, 2, None);
    write_raster(dir.path(), "a_2022-02-01.tif", &[2.0; 4], 2, 2, None);
    let geometry = write_features(
        dir.path(),
        "EPSG:32633",
        &[(r#"{"id":"x"}"#, covering()), (r#"{"id":"y"}"#, outside())],
    );
    let mut cfg = config(&dir, geometry, vec![format!("{}/*.tif", dir.path().display())]);
    cfg.export_csv = true;
    cfg.id_field = Some("id".into());
    cfg.embed_timeseries = true;

    let read_all = |cfg: &RunConfig| -> Vec<Vec<u8>> {
        let csv_dir = cfg.csv_directory();
        vec![
            fs::read(&cfg.output_path).unwrap(),
            fs::read(csv_dir.join("x.csv")).unwrap(),
            fs::read(csv_dir.join("y.csv")).unwrap(),
        ]
    };

    run(&cfg).unwrap();
    let first = read_all(&cfg);
    run(&cfg).unwrap();
    assert_eq!(first, read_all(&cfg));
}

#[test]
fn unreadable_raster_in_series_yields_null_row() {
    let dir = tempfile::tempdir().unwrap();
    write_raster(dir.path(), "s_20220101.tif", &[1.0; 4], 2, 2, None);
    fs::write(dir.path().join("s_20220201.tif"), b"not a tiff").unwrap();
    write_raster(dir.path(), "s_20220301.tif", &[3.0; 4], 2, 2, None);
    let geometry = write_features(dir.path(), "EPSG:32633", &[("{}", covering())]);
    let mut cfg = config(&dir, geometry, vec![format!("{}/s_*.tif", dir.path().display())]);
    cfg.export_csv = true;

    let summary = run(&cfg).unwrap();
    assert_eq!(summary.rasters_processed, 2);
    assert_eq!(summary.rasters_failed.len(), 1);
    assert!(summary.rasters_failed[0].path.ends_with("s_20220201.tif"));

    let csv = fs::read_to_string(cfg.csv_directory().join("feature_0.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[2], "2022-02-01,0,,,,,,0,0");
}

#[test]
fn band_count_change_in_series_yields_null_row() {
    let dir = tempfile::tempdir().unwrap();
    write_raster(dir.path(), "s_20220101.tif", &[1.0; 4], 2, 2, None);
    let bands = (0..3).map(|b| Array2::from_elem((2, 2), b as f64)).collect();
    let mut rgb = Raster::from_bands(bands).unwrap();
    rgb.set_transform(GeoTransform::new(500_000.0, 5_000_020.0, 10.0, -10.0));
    rgb.set_crs(Some(CRS::from_epsg(UTM_33N)));
    write_geotiff(&rgb, dir.path().join("s_20220201.tif"), Some(GeoTiffOptions { write_crs: true })).unwrap();
    let geometry = write_features(dir.path(), "EPSG:32633", &[("{}", covering())]);
    let mut cfg = config(&dir, geometry, vec![format!("{}/s_*.tif", dir.path().display())]);
    cfg.export_csv = true;

    let summary = run(&cfg).unwrap();
    assert_eq!(summary.rasters_processed, 1);
    assert_eq!(summary.rasters_failed.len(), 1);
    assert!(summary.rasters_failed[0].path.ends_with("s_20220201.tif"));
    assert!(summary.rasters_failed[0].reason.contains("3 bands"));

    let csv = fs::read_to_string(cfg.csv_directory().join("feature_0.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "date,count,sum,mean,min,max,std,pixels,nodata");
    assert_eq!(lines[2], "2022-02-01,0,,,,,,0,0");
}

#[test]
fn band_names_checked_against_first_raster() {
    let dir = tempfile::tempdir().unwrap();
    write_raster(dir.path(), "s_20220101.tif", &[1.0; 4], 2, 2, None);
    // Reaching the second raster would fail on its missing CRS instead
    let mut undeclared = Raster::from_vec(vec![2.0; 4], 2, 2).unwrap();
    undeclared.set_transform(GeoTransform::new(500_000.0, 5_000_020.0, 10.0, -10.0));
    write_geotiff(&undeclared, dir.path().join("s_20220201.tif"), None).unwrap();
    let geometry = write_features(dir.path(), "EPSG:32633", &[("{}", covering())]);
    let mut cfg = config(&dir, geometry, vec![format!("{}/s_*.tif", dir.path().display())]);
    cfg.band_names = vec!["red".into(), "nir".into()];

    match run(&cfg).unwrap_err() {
        Error::Config(reason) => assert!(reason.contains("2 band names"), "{reason}"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!cfg.output_path.exists());
}

#[test]
fn only_raster_unreadable_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("broken.tif");
    fs::write(&bad, b"garbage").unwrap();
    let geometry = write_features(dir.path(), "EPSG:32633", &[("{}", covering())]);
    let cfg = config(&dir, geometry, vec![path_string(&bad)]);

    assert!(run(&cfg).is_err());
    assert!(!cfg.output_path.exists());
}

#[test]
fn undated_raster_in_series_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let dated = write_raster(dir.path(), "s_20220101.tif", &[1.0; 4], 2, 2, None);
    let undated = write_raster(dir.path(), "mosaic.tif", &[1.0; 4], 2, 2, None);
    let geometry = write_features(dir.path(), "EPSG:32633", &[("{}", covering())]);
    let cfg = config(&dir, geometry, vec![path_string(&dated), path_string(&undated)]);

    assert!(matches!(run(&cfg), Err(Error::TemporalKey { .. })));
}

#[test]
fn geographic_features_are_reprojected_for_masking() {
    let dir = tempfile::tempdir().unwrap();
    let raster = write_raster(dir.path(), "utm.tif", &[1.0, 2.0, 3.0, 4.0], 2, 2, None);
    // Around the raster's location near 15E 45.15N
    let lonlat = ring(14.99, 45.10, 15.01, 45.20);
    let geometry = write_features(dir.path(), "urn:ogc:def:crs:OGC:1.3:CRS84", &[("{}", lonlat.clone())]);
    let cfg = config(&dir, geometry, vec![path_string(&raster)]);

    run(&cfg).unwrap();
    let out = output(&cfg);
    let f = &out.features[0];
    assert_eq!(f.get_property("count"), Some(&AttributeValue::Int(4)));
    assert_relative_eq!(number(f, "mean"), 2.5);

    // Output geometry stays in the input CRS
    let expected = read_geojson(dir.path().join("zones.geojson")).unwrap();
    assert_eq!(f.geometry, expected.features[0].geometry);
}

#[test]
fn existing_attributes_are_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let raster = write_raster(dir.path(), "scene.tif", &[1.0, 2.0, 3.0, 4.0], 2, 2, None);
    let geometry = write_features(dir.path(), "EPSG:32633", &[(r#"{"mean":"keep me"}"#, covering())]);
    let cfg = config(&dir, geometry, vec![path_string(&raster)]);

    run(&cfg).unwrap();
    let f = &output(&cfg).features[0];
    assert_eq!(f.get_property("mean"), Some(&AttributeValue::String("keep me".into())));
    assert_relative_eq!(number(f, "mean_1"), 2.5);
}

#[test]
fn embedded_time_series_and_mean_reducer() {
    let dir = tempfile::tempdir().unwrap();
    write_raster(dir.path(), "t_20220101.tif", &[2.0; 4], 2, 2, None);
    write_raster(dir.path(), "t_20220201.tif", &[4.0; 4], 2, 2, None);
    let geometry = write_features(dir.path(), "EPSG:32633", &[("{}", covering())]);
    let mut cfg = config(&dir, geometry, vec![format!("{}/t_*.tif", dir.path().display())]);
    cfg.reducer = Reducer::Mean;
    cfg.embed_timeseries = true;
    cfg.band_names = vec!["ndvi".into()];

    run(&cfg).unwrap();
    let f = &output(&cfg).features[0];
    assert_relative_eq!(number(f, "ndvi_mean"), 3.0);
    assert_eq!(f.get_property("date"), None);
    match f.get_property("timeseries") {
        Some(AttributeValue::Json(serde_json::Value::Array(entries))) => {
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0]["date"], "2022-01-01");
            assert_eq!(entries[1]["ndvi_mean"], 4.0);
        }
        other => panic!("unexpected timeseries: {other:?}"),
    }
}

#[test]
fn shapefile_output_falls_back_to_geojson() {
    let dir = tempfile::tempdir().unwrap();
    let raster = write_raster(dir.path(), "scene.tif", &[1.0; 4], 2, 2, None);
    let geometry = write_features(dir.path(), "EPSG:32633", &[("{}", covering())]);
    let mut cfg = config(&dir, geometry, vec![path_string(&raster)]);
    cfg.output_path = dir.path().join("zones_stats.shp");

    let summary = run(&cfg).unwrap();
    let written = dir.path().join("zones_stats.geojson");
    assert_eq!(summary.files_written, vec![written.clone()]);
    assert_eq!(read_geojson(&written).unwrap().len(), 1);
}

#[test]
fn all_touched_includes_boundary_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let raster = write_raster(dir.path(), "scene.tif", &[1.0; 16], 4, 4, None);
    // Covers the centers of the two middle columns of rows 1 and 2 only
    let inner = ring(500_008.0, 5_000_012.0, 500_032.0, 5_000_028.0);
    let geometry = write_features(dir.path(), "EPSG:32633", &[("{}", inner)]);

    let mut cfg = config(&dir, geometry, vec![path_string(&raster)]);
    run(&cfg).unwrap();
    assert_eq!(output(&cfg).features[0].get_property("count"), Some(&AttributeValue::Int(4)));

    cfg.all_touched = true;
    run(&cfg).unwrap();
    assert_eq!(output(&cfg).features[0].get_property("count"), Some(&AttributeValue::Int(8)));
}

#[test]
fn topology_preserving_simplification_keeps_valid_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let raster = write_raster(dir.path(), "scene.tif", &[1.0; 4], 2, 2, None);
    // Jagged square with a hole, in metres
    let coords = "[[[499990,4999990],[500005,4999991],[500030,4999990],[500029,5000010],\
                  [500030,5000030],[500010,5000029],[499990,5000030],[499990,4999990]],\
                  [[499995,4999995],[499998,4999995],[499998,4999998],[499995,4999998],[499995,4999995]]]";
    let geometry = write_features(dir.path(), "EPSG:32633", &[("{}", coords.to_string())]);
    let mut cfg = config(&dir, geometry, vec![path_string(&raster)]);
    cfg.simplify_tolerance = Some(2.0);

    let summary = run(&cfg).unwrap();
    assert!(summary.simplify_fallbacks.is_empty());

    let f = &output(&cfg).features[0];
    match &f.geometry {
        Some(geo::Geometry::Polygon(p)) => {
            assert_eq!(p.interiors().len(), 1);
            assert!(p.exterior().0.len() < 8);
            let mp = geo::MultiPolygon::new(vec![p.clone()]);
            assert!(geozonal_algorithms::vector::check_multipolygon(&mp).is_ok());
        }
        other => panic!("unexpected geometry: {other:?}"),
    }
}
