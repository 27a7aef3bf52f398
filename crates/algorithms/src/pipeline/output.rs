//! Writing the aggregated collection and per-feature tables

use crate::pipeline::features::PreparedFeatures;
use crate::temporal::{StatColumns, TemporalAggregator};
use geozonal_core::io::{create_vector_sink, sanitize_file_stem, write_table, FieldNamer};
use geozonal_core::vector::AttributeValue;
use geozonal_core::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Name of the embedded time series property
pub const TIMESERIES_FIELD: &str = "timeseries";

/// Append statistics to every feature and write the collection to `output`.
///
/// Appended names never replace an existing attribute: they are resolved
/// against all names already present in the collection. Returns the path
/// actually written.
pub fn write_collection(
    features: &mut PreparedFeatures,
    aggregator: &TemporalAggregator,
    columns: &StatColumns,
    output: &Path,
    embed_timeseries: bool,
) -> Result<PathBuf> {
    let sink = create_vector_sink(output)?;

    let series = aggregator.raster_count() > 1;
    let mut requested = aggregator.attribute_names(columns);
    if series && embed_timeseries {
        requested.push(TIMESERIES_FIELD.to_string());
    }

    let resolved = resolve_field_names(
        features.collection.attribute_names(),
        requested,
        sink.max_field_name_len(),
    );
    let field = |name: &str| resolved.get(name).cloned().unwrap_or_else(|| name.to_string());

    for (index, feature) in features.collection.features.iter_mut().enumerate() {
        for (name, value) in aggregator.attributes(index, columns) {
            feature.set_property(field(&name), value);
        }
        if series && embed_timeseries {
            feature.set_property(
                field(TIMESERIES_FIELD),
                AttributeValue::Json(aggregator.timeseries_json(index, columns)),
            );
        }
    }

    sink.write(&features.collection)?;
    tracing::info!("Wrote {} features to {}", features.len(), sink.path().display());
    Ok(sink.path().to_path_buf())
}

/// Map each requested attribute name to the name it is stored under.
///
/// Names are fitted to `max_len` when the sink limits them, then suffixed
/// until they clash with neither `existing` nor an earlier assignment.
pub fn resolve_field_names(
    existing: Vec<String>,
    requested: Vec<String>,
    max_len: Option<usize>,
) -> HashMap<String, String> {
    let mut namer = FieldNamer::new(existing, max_len);
    let mut resolved = HashMap::with_capacity(requested.len());
    for name in requested {
        let assigned = namer.assign(&name);
        if assigned != name {
            tracing::warn!("Attribute '{}' cannot be stored as is; statistics written as '{}'", name, assigned);
        }
        resolved.insert(name, assigned);
    }
    resolved
}

/// One CSV per feature in `dir`, named after the sanitized feature id.
/// Existing files are overwritten.
pub fn write_tables(
    features: &PreparedFeatures,
    aggregator: &TemporalAggregator,
    columns: &StatColumns,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(features.len());
    for (index, id) in features.ids.iter().enumerate() {
        let table = aggregator.table(index, columns)?;
        let path = dir.join(format!("{}.csv", sanitize_file_stem(id)));
        write_table(&table, &path)?;
        if index % 10 == 0 {
            tracing::debug!("Saved table {}/{} for feature {}", index + 1, features.len(), id);
        }
        written.push(path);
    }
    tracing::info!("Wrote {} time series tables to {}", written.len(), dir.display());
    Ok(written)
}
