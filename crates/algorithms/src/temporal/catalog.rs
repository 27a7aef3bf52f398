//! Raster catalog: expands path patterns and orders rasters by date

use crate::temporal::date::{DateKeyFailure, DatePattern};
use chrono::NaiveDate;
use geozonal_core::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One raster of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterEntry {
    pub path: PathBuf,
    /// Date parsed from the file name; `None` only in a single-raster run
    pub date: Option<NaiveDate>,
}

impl RasterEntry {
    /// ISO date, or the file name for an undated snapshot
    pub fn label(&self) -> String {
        match self.date {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => file_name(&self.path),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn has_glob_metachars(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Expand raster path patterns in order, dropping repeated paths.
///
/// A pattern without glob metacharacters is taken as a literal path. A glob
/// that matches no file is a configuration error.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();

    for pattern in patterns {
        if !has_glob_metachars(pattern) {
            let path = PathBuf::from(pattern);
            if seen.insert(path.clone()) {
                paths.push(path);
            }
            continue;
        }

        let entries = glob::glob(pattern).map_err(|e| Error::Pattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        let mut matched: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::Pattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            if path.is_file() {
                matched.push(path);
            }
        }
        if matched.is_empty() {
            return Err(Error::Config(format!(
                "raster pattern '{}' matches no file",
                pattern
            )));
        }
        matched.sort();
        for path in matched {
            if seen.insert(path.clone()) {
                paths.push(path);
            }
        }
    }

    Ok(paths)
}

/// The ordered rasters of a run.
///
/// A single raster may be undated (snapshot run). With two or more rasters
/// every file name must carry a date and no two may share one; entries are
/// sorted ascending by date regardless of discovery order.
#[derive(Debug, Clone)]
pub struct RasterCatalog {
    entries: Vec<RasterEntry>,
}

impl RasterCatalog {
    /// Expand `patterns` and key every match with `dates`
    pub fn resolve(patterns: &[String], dates: &DatePattern) -> Result<Self> {
        Self::from_paths(expand_patterns(patterns)?, dates)
    }

    pub fn from_paths(paths: Vec<PathBuf>, dates: &DatePattern) -> Result<Self> {
        if paths.is_empty() {
            return Err(Error::Config("no raster inputs".to_string()));
        }

        let key_failure = |path: &Path, failure: DateKeyFailure| Error::TemporalKey {
            path: path.to_path_buf(),
            reason: failure.to_string(),
        };

        if paths.len() == 1 {
            let path = paths.into_iter().next().ok_or_else(|| Error::Config("no raster inputs".to_string()))?;
            let date = match dates.parse(&file_name(&path)) {
                Ok(date) => Some(date),
                Err(DateKeyFailure::NoMatch) => None,
                // a lone raster needs no ordering key
                Err(failure) => {
                    tracing::warn!("{}: {}; treating it as an undated snapshot", path.display(), failure);
                    None
                }
            };
            return Ok(Self {
                entries: vec![RasterEntry { path, date }],
            });
        }

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let date = dates
                .parse(&file_name(&path))
                .map_err(|failure| key_failure(&path, failure))?;
            entries.push(RasterEntry {
                path,
                date: Some(date),
            });
        }

        entries.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path)));
        for pair in entries.windows(2) {
            if pair[0].date == pair[1].date {
                return Err(Error::TemporalKey {
                    path: pair[1].path.clone(),
                    reason: format!(
                        "date {} is also used by {}",
                        pair[1].label(),
                        pair[0].path.display()
                    ),
                });
            }
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[RasterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether more than one raster is processed
    pub fn is_series(&self) -> bool {
        self.entries.len() > 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &RasterEntry> {
        self.entries.iter()
    }
}
