//! Temporal aggregation of per-raster statistics
//!
//! Records arrive one raster at a time, in catalog (ascending date) order,
//! and are folded into feature attributes and per-feature tables.

use crate::statistics::{ZonalStatistic, ZonalStats};
use geozonal_core::io::Table;
use geozonal_core::vector::AttributeValue;
use geozonal_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reduces a feature's time series to the top-level attributes of the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    /// Statistics of the most recent raster
    #[default]
    Last,
    /// Statistics of the earliest raster
    First,
    /// Per statistic, the mean over readable rasters where it is defined
    Mean,
}

impl FromStr for Reducer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "last" => Ok(Reducer::Last),
            "first" => Ok(Reducer::First),
            "mean" => Ok(Reducer::Mean),
            other => Err(Error::InvalidParameter {
                name: "reducer",
                value: other.to_string(),
                reason: "expected last, first or mean".to_string(),
            }),
        }
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reducer::Last => write!(f, "last"),
            Reducer::First => write!(f, "first"),
            Reducer::Mean => write!(f, "mean"),
        }
    }
}

/// Column names of the statistics, one block per band
#[derive(Debug, Clone, PartialEq)]
pub struct StatColumns {
    prefixes: Vec<Option<String>>,
}

impl StatColumns {
    /// Single-band rasters without configured names get bare statistic names;
    /// otherwise each band is prefixed by its name (default `band_<n>`).
    pub fn new(band_count: usize, band_names: &[String]) -> Result<Self> {
        if !band_names.is_empty() && band_names.len() != band_count {
            return Err(Error::Config(format!(
                "{} band names given for rasters with {} bands",
                band_names.len(),
                band_count
            )));
        }
        let prefixes = if band_names.is_empty() && band_count == 1 {
            vec![None]
        } else if band_names.is_empty() {
            (1..=band_count).map(|n| Some(format!("band_{}", n))).collect()
        } else {
            band_names.iter().cloned().map(Some).collect()
        };
        Ok(Self { prefixes })
    }

    pub fn band_count(&self) -> usize {
        self.prefixes.len()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.prefixes.len() * ZonalStatistic::ALL.len());
        for prefix in &self.prefixes {
            for stat in ZonalStatistic::ALL {
                names.push(match prefix {
                    Some(p) => format!("{}_{}", p, stat.name()),
                    None => stat.name().to_string(),
                });
            }
        }
        names
    }

    /// Values in [`names`](Self::names) order; a missing record is all null
    /// statistics with zero tallies.
    pub fn values(&self, record: Option<&[ZonalStats]>) -> Vec<AttributeValue> {
        let unavailable = ZonalStats::unavailable();
        let mut values = Vec::with_capacity(self.prefixes.len() * ZonalStatistic::ALL.len());
        for band in 0..self.prefixes.len() {
            let stats = record.and_then(|r| r.get(band)).unwrap_or(&unavailable);
            values.extend(ZonalStatistic::ALL.iter().map(|s| stats.value(*s)));
        }
        values
    }
}

/// Per-feature accumulation of statistics records across rasters
#[derive(Debug, Clone)]
pub struct TemporalAggregator {
    reducer: Reducer,
    labels: Vec<String>,
    /// `[feature][raster]`; `None` when the raster could not be read
    records: Vec<Vec<Option<Vec<ZonalStats>>>>,
}

impl TemporalAggregator {
    pub fn new(feature_count: usize, reducer: Reducer) -> Self {
        Self {
            reducer,
            labels: Vec::new(),
            records: vec![Vec::new(); feature_count],
        }
    }

    pub fn feature_count(&self) -> usize {
        self.records.len()
    }

    pub fn raster_count(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Open the slot of the next raster; every feature starts unavailable
    pub fn begin_raster(&mut self, label: impl Into<String>) {
        self.labels.push(label.into());
        for series in &mut self.records {
            series.push(None);
        }
    }

    /// Store the per-band record of `feature` for the current raster
    pub fn record(&mut self, feature: usize, stats: Vec<ZonalStats>) -> Result<()> {
        let slot = self
            .records
            .get_mut(feature)
            .and_then(|series| series.last_mut())
            .ok_or_else(|| Error::Other(format!("no open raster slot for feature {}", feature)))?;
        *slot = Some(stats);
        Ok(())
    }

    fn series(&self, feature: usize) -> &[Option<Vec<ZonalStats>>] {
        self.records.get(feature).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Attributes appended to `feature` in the output collection.
    ///
    /// One raster: its statistics, flattened. Several rasters: the reduced
    /// statistics, preceded by `date` for the `last` and `first` reducers.
    pub fn attributes(&self, feature: usize, columns: &StatColumns) -> Vec<(String, AttributeValue)> {
        let series = self.series(feature);
        let names = columns.names();

        if self.labels.len() <= 1 {
            let record = series.first().and_then(|r| r.as_deref());
            return names.into_iter().zip(columns.values(record)).collect();
        }

        let (date, values) = match self.reducer {
            Reducer::Last => (
                self.labels.last().cloned(),
                columns.values(series.last().and_then(|r| r.as_deref())),
            ),
            Reducer::First => (
                self.labels.first().cloned(),
                columns.values(series.first().and_then(|r| r.as_deref())),
            ),
            Reducer::Mean => (None, self.mean_values(series, columns)),
        };

        let mut attrs = Vec::with_capacity(names.len() + 1);
        if let Some(date) = date {
            attrs.push(("date".to_string(), AttributeValue::String(date)));
        }
        attrs.extend(names.into_iter().zip(values));
        attrs
    }

    /// Names produced by [`attributes`](Self::attributes), in order
    pub fn attribute_names(&self, columns: &StatColumns) -> Vec<String> {
        let mut names = Vec::new();
        if self.labels.len() > 1 && self.reducer != Reducer::Mean {
            names.push("date".to_string());
        }
        names.extend(columns.names());
        names
    }

    fn mean_values(&self, series: &[Option<Vec<ZonalStats>>], columns: &StatColumns) -> Vec<AttributeValue> {
        // Unreadable rasters do not contribute, not even zero tallies
        let rows: Vec<Vec<AttributeValue>> = series
            .iter()
            .filter_map(|r| r.as_deref())
            .map(|r| columns.values(Some(r)))
            .collect();
        let width = columns.band_count() * ZonalStatistic::ALL.len();

        (0..width)
            .map(|col| {
                let defined: Vec<f64> = rows
                    .iter()
                    .filter_map(|row| match row.get(col) {
                        Some(AttributeValue::Float(v)) => Some(*v),
                        Some(AttributeValue::Int(v)) => Some(*v as f64),
                        _ => None,
                    })
                    .collect();
                if defined.is_empty() {
                    AttributeValue::Null
                } else {
                    AttributeValue::from_f64(Some(defined.iter().sum::<f64>() / defined.len() as f64))
                }
            })
            .collect()
    }

    /// The feature's time series: header `date` plus statistic columns, one
    /// row per raster in ascending date order.
    pub fn table(&self, feature: usize, columns: &StatColumns) -> Result<Table> {
        let mut header = vec!["date".to_string()];
        header.extend(columns.names());
        let mut table = Table::new(header);

        for (label, record) in self.labels.iter().zip(self.series(feature)) {
            let mut row = vec![AttributeValue::String(label.clone())];
            row.extend(columns.values(record.as_deref()));
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// The feature's time series as a JSON array of `{date, <stat>...}` objects
    pub fn timeseries_json(&self, feature: usize, columns: &StatColumns) -> serde_json::Value {
        let names = columns.names();
        let entries = self
            .labels
            .iter()
            .zip(self.series(feature))
            .map(|(label, record)| {
                let mut object = serde_json::Map::new();
                object.insert("date".to_string(), serde_json::Value::String(label.clone()));
                for (name, value) in names.iter().zip(columns.values(record.as_deref())) {
                    object.insert(name.clone(), value.to_json());
                }
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(entries)
    }

    /// Features without a valid pixel in raster `raster`
    pub fn empty_count(&self, raster: usize) -> usize {
        self.records
            .iter()
            .filter(|series| match series.get(raster) {
                Some(Some(bands)) => bands.iter().all(ZonalStats::is_empty),
                _ => false,
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stats(values: &[f64]) -> Vec<ZonalStats> {
        vec![ZonalStats::from_values(values, values.len())]
    }

    fn single_band() -> StatColumns {
        StatColumns::new(1, &[]).unwrap()
    }

    fn lookup<'a>(attrs: &'a [(String, AttributeValue)], key: &str) -> &'a AttributeValue {
        &attrs.iter().find(|(k, _)| k == key).unwrap().1
    }

    #[test]
    fn test_column_naming() {
        assert_eq!(single_band().names()[..3], ["count", "sum", "mean"]);
        let multi = StatColumns::new(2, &[]).unwrap();
        assert_eq!(multi.names()[0], "band_1_count");
        assert_eq!(multi.names()[8], "band_2_count");
        let named = StatColumns::new(1, &["ndvi".to_string()]).unwrap();
        assert_eq!(named.names()[2], "ndvi_mean");
        assert!(StatColumns::new(2, &["ndvi".to_string()]).is_err());
    }

    #[test]
    fn test_single_raster_is_flattened() {
        let mut agg = TemporalAggregator::new(1, Reducer::Last);
        agg.begin_raster("mosaic.tif");
        agg.record(0, stats(&[1.0, 2.0, 3.0, 4.0])).unwrap();

        let attrs = agg.attributes(0, &single_band());
        assert!(attrs.iter().all(|(k, _)| k != "date"));
        assert_eq!(lookup(&attrs, "mean"), &AttributeValue::Float(2.5));
        assert_eq!(lookup(&attrs, "count"), &AttributeValue::Int(4));
    }

    #[test]
    fn test_reducers() {
        let mut agg = TemporalAggregator::new(1, Reducer::Last);
        agg.begin_raster("2022-01-01");
        agg.record(0, stats(&[2.0])).unwrap();
        agg.begin_raster("2022-06-01");
        agg.record(0, stats(&[4.0])).unwrap();
        agg.begin_raster("2022-09-01"); // unreadable raster

        let cols = single_band();
        let last = agg.attributes(0, &cols);
        assert_eq!(lookup(&last, "date"), &AttributeValue::String("2022-09-01".into()));
        assert_eq!(lookup(&last, "mean"), &AttributeValue::Null);

        agg.reducer = Reducer::First;
        let first = agg.attributes(0, &cols);
        assert_eq!(lookup(&first, "mean"), &AttributeValue::Float(2.0));

        agg.reducer = Reducer::Mean;
        let mean = agg.attributes(0, &cols);
        assert!(mean.iter().all(|(k, _)| k != "date"));
        match lookup(&mean, "mean") {
            AttributeValue::Float(v) => assert_relative_eq!(*v, 3.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_table_rows_follow_raster_order() {
        let mut agg = TemporalAggregator::new(2, Reducer::Last);
        agg.begin_raster("2022-01-01");
        agg.record(0, stats(&[1.0])).unwrap();
        agg.record(1, stats(&[])).unwrap();
        agg.begin_raster("2022-06-01");
        agg.record(0, stats(&[3.0])).unwrap();
        agg.record(1, stats(&[5.0])).unwrap();

        let table = agg.table(1, &single_band()).unwrap();
        assert_eq!(table.columns[0], "date");
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], AttributeValue::String("2022-01-01".into()));
        assert_eq!(table.rows[0][3], AttributeValue::Null);
        assert_eq!(table.rows[1][3], AttributeValue::Float(5.0));
        assert_eq!(agg.empty_count(0), 1);
        assert_eq!(agg.empty_count(1), 0);
    }

    #[test]
    fn test_timeseries_json() {
        let mut agg = TemporalAggregator::new(1, Reducer::Last);
        agg.begin_raster("2022-01-01");
        agg.record(0, stats(&[1.0, 3.0])).unwrap();
        let json = agg.timeseries_json(0, &single_band());
        assert_eq!(json[0]["date"], "2022-01-01");
        assert_eq!(json[0]["mean"], 2.0);
        assert_eq!(json[0]["count"], 2);
    }

    #[test]
    fn test_reducer_parsing() {
        assert_eq!("LAST".parse::<Reducer>().unwrap(), Reducer::Last);
        assert_eq!("mean".parse::<Reducer>().unwrap(), Reducer::Mean);
        assert!("median".parse::<Reducer>().is_err());
    }
}
