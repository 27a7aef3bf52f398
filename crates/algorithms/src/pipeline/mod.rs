//! Zonal statistics run
//!
//! Catalog → feature preparation → per raster: reprojection, masking,
//! extraction → aggregation → output. Every fatal configuration problem is
//! detected before the first raster is read.

pub mod config;
pub mod features;
pub mod output;

pub use config::{RunConfig, DEFAULT_CSV_DIR};
pub use features::{check_table_names, polygonal, prepare_features, resolve_ids, PreparedFeatures};
pub use output::{write_collection, write_tables, TIMESERIES_FIELD};

use crate::statistics::{ExtractOptions, PixelInclusion, ZonalExtractor, ZonalStats};
use crate::temporal::{RasterCatalog, RasterEntry, StatColumns, TemporalAggregator};
use crate::vector::{ProjectionContext, SimplifyParams};
use geo::{Geometry, MultiPolygon};
use geozonal_core::io::{open_raster, read_vector, RasterSource};
use geozonal_core::{Error, Result, CRS};
use std::collections::HashMap;
use std::path::PathBuf;

/// A raster that could not be processed
#[derive(Debug, Clone)]
pub struct RasterFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// What a run did
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub features: usize,
    pub rasters_processed: usize,
    pub rasters_failed: Vec<RasterFailure>,
    /// Per processed raster label, features without a valid pixel
    pub empty_features: Vec<(String, usize)>,
    /// Feature indices that kept their original geometry
    pub simplify_fallbacks: Vec<usize>,
    pub files_written: Vec<PathBuf>,
}

impl RunSummary {
    /// Log the summary at INFO, problems at WARN
    pub fn log(&self) {
        tracing::info!(
            "Processed {} raster(s) for {} feature(s); {} raster(s) failed",
            self.rasters_processed,
            self.features,
            self.rasters_failed.len()
        );
        for failure in &self.rasters_failed {
            tracing::warn!("  failed: {} ({})", failure.path.display(), failure.reason);
        }
        for (label, count) in self.empty_features.iter().filter(|(_, c)| *c > 0) {
            tracing::info!("  {} feature(s) had no valid pixels for raster {}", count, label);
        }
        if !self.simplify_fallbacks.is_empty() {
            tracing::warn!(
                "  {} feature(s) kept their original geometry after failed simplification",
                self.simplify_fallbacks.len()
            );
        }
        tracing::info!("  {} file(s) written", self.files_written.len());
    }
}

/// The CRS of the vector input: explicit override, then the file's own
/// declaration, then WGS84
pub fn vector_crs(config: &RunConfig, declared: Option<&CRS>) -> CRS {
    match (config.geometry_epsg, declared) {
        (Some(code), _) => CRS::from_epsg(code),
        (None, Some(crs)) => crs.clone(),
        (None, None) => CRS::wgs84(),
    }
}

/// Geometries per raster CRS, reprojected once and reused
struct ReprojectionCache {
    context: ProjectionContext,
    by_crs: HashMap<String, Vec<MultiPolygon<f64>>>,
}

impl ReprojectionCache {
    fn new() -> Self {
        Self {
            context: ProjectionContext::new(),
            by_crs: HashMap::new(),
        }
    }

    fn get<'a>(&'a mut self, features: &'a PreparedFeatures, target: &CRS) -> Result<&'a [MultiPolygon<f64>]> {
        if features.crs.is_equivalent(target) {
            return Ok(features.geometries.as_slice());
        }
        let key = target.identifier();
        if !self.by_crs.contains_key(&key) {
            tracing::info!("Reprojecting {} features from {} to {}", features.len(), features.crs, target);
            let mut reprojected = Vec::with_capacity(features.len());
            for (index, geometry) in features.geometries.iter().enumerate() {
                let projected = self.context.reproject(
                    &Geometry::MultiPolygon(geometry.clone()),
                    &features.crs,
                    target,
                )?;
                reprojected.push(polygonal(index, Some(&projected))?);
            }
            self.by_crs.insert(key.clone(), reprojected);
        }
        self.by_crs
            .get(&key)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UndefinedCrs(key))
    }
}

/// Outcome of one raster that did not abort the run
enum RasterOutcome {
    Done {
        bands: usize,
        records: Vec<Vec<ZonalStats>>,
    },
    Skipped(Error),
}

fn process_raster(
    entry: &RasterEntry,
    features: &PreparedFeatures,
    reprojection: &mut ReprojectionCache,
    extractor: &mut ZonalExtractor,
    columns: Option<&StatColumns>,
    band_names: &[String],
) -> Result<RasterOutcome> {
    let mut source: Box<dyn RasterSource> = match open_raster(&entry.path) {
        Ok(source) => source,
        Err(e) => return Ok(RasterOutcome::Skipped(e)),
    };

    match columns {
        Some(columns) if source.band_count() != columns.band_count() => {
            return Ok(RasterOutcome::Skipped(Error::Other(format!(
                "raster has {} bands, earlier rasters have {}",
                source.band_count(),
                columns.band_count()
            ))));
        }
        Some(_) => {}
        // first readable raster: band names must fit before any pixel is read
        None => {
            StatColumns::new(source.band_count(), band_names)?;
        }
    }

    // A raster without a CRS cannot be related to the features
    let crs = source
        .crs()
        .ok_or_else(|| Error::UndefinedCrs(format!("raster {}", entry.path.display())))?;
    let geometries = reprojection.get(features, &crs)?;

    if extractor.prepare(source.as_ref(), geometries) {
        tracing::debug!("Reusing pixel masks for {}", entry.path.display());
    }

    let mut records = Vec::with_capacity(features.len());
    for index in 0..features.len() {
        if index % 10 == 0 {
            tracing::debug!("Processing feature {}/{}", index + 1, features.len());
        }
        match extractor.extract(source.as_mut(), index) {
            Ok(stats) => records.push(stats),
            Err(e) => return Ok(RasterOutcome::Skipped(e)),
        }
    }
    Ok(RasterOutcome::Done {
        bands: source.band_count(),
        records,
    })
}

/// Run zonal statistics as configured.
///
/// Fatal errors (configuration, identifiers, temporal keys, reprojection,
/// output) abort the run. An unreadable raster is skipped with a warning and
/// its records stay null, unless no raster at all can be read.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    config.validate()?;
    let dates = config.date_pattern()?;
    let catalog = RasterCatalog::resolve(&config.raster_paths, &dates)?;
    tracing::info!("Processing {} raster(s)", catalog.len());

    let collection = read_vector(&config.geometry_path)?;
    tracing::info!("Loaded {} features from {}", collection.len(), config.geometry_path.display());
    let crs = vector_crs(config, collection.crs.as_ref());

    let simplify = config.simplify_tolerance.map(|tolerance| SimplifyParams {
        tolerance,
        preserve_topology: config.preserve_topology,
    });
    if let Some(params) = &simplify {
        tracing::info!(
            "Simplifying geometries (tolerance={} {}, preserve_topology={})",
            params.tolerance,
            if crs.is_geographic() { "degrees" } else { "CRS units" },
            params.preserve_topology
        );
    }
    let mut features = prepare_features(collection, crs, config.id_field.as_deref(), simplify.as_ref())?;

    let export_tables = config.export_csv && catalog.is_series();
    if export_tables {
        check_table_names(&features.ids)?;
    } else if config.export_csv {
        tracing::info!("Single raster run: no time series tables are written");
    }

    let mut extractor = ZonalExtractor::new(ExtractOptions {
        inclusion: PixelInclusion::from_all_touched(config.all_touched),
        nodata: config.nodata,
    });
    let mut reprojection = ReprojectionCache::new();
    let mut aggregator = TemporalAggregator::new(features.len(), config.reducer);
    let mut columns: Option<StatColumns> = None;
    let mut summary = RunSummary {
        features: features.len(),
        simplify_fallbacks: features.simplify_fallbacks.clone(),
        ..Default::default()
    };
    let mut last_failure: Option<Error> = None;

    for (i, entry) in catalog.iter().enumerate() {
        tracing::info!("[{}/{}] Processing raster: {}", i + 1, catalog.len(), entry.path.display());
        aggregator.begin_raster(entry.label());

        let outcome = process_raster(
            entry,
            &features,
            &mut reprojection,
            &mut extractor,
            columns.as_ref(),
            &config.band_names,
        )?;
        match outcome {
            RasterOutcome::Done { bands, records } => {
                if columns.is_none() {
                    columns = Some(StatColumns::new(bands, &config.band_names)?);
                }
                for (index, stats) in records.into_iter().enumerate() {
                    aggregator.record(index, stats)?;
                }
                let empty = aggregator.empty_count(i);
                tracing::info!(
                    "Computed statistics for {} features in {} ({} without valid pixels)",
                    features.len(),
                    entry.path.display(),
                    empty
                );
                summary.rasters_processed += 1;
                summary.empty_features.push((entry.label(), empty));
            }
            RasterOutcome::Skipped(error) => {
                tracing::warn!("Skipping raster {}: {}", entry.path.display(), error);
                summary.rasters_failed.push(RasterFailure {
                    path: entry.path.clone(),
                    reason: error.to_string(),
                });
                last_failure = Some(error);
            }
        }
    }

    let columns = match columns {
        Some(columns) => columns,
        None => {
            return Err(match last_failure {
                Some(error) if catalog.len() == 1 => error,
                _ => Error::Other(format!("none of the {} rasters could be read", catalog.len())),
            })
        }
    };

    let written = write_collection(
        &mut features,
        &aggregator,
        &columns,
        &config.output_path,
        config.embed_timeseries,
    )?;
    summary.files_written.push(written);

    if export_tables {
        let dir = config.csv_directory();
        summary
            .files_written
            .extend(write_tables(&features, &aggregator, &columns, &dir)?);
    }

    summary.log();
    Ok(summary)
}
