//! Zonal statistics record
//!
//! Summary of the raster values a feature's mask selects, for one band.

use geozonal_core::vector::AttributeValue;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Available zonal statistics, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZonalStatistic {
    Count,
    Sum,
    Mean,
    Min,
    Max,
    Std,
    Pixels,
    Nodata,
}

impl ZonalStatistic {
    pub const ALL: [ZonalStatistic; 8] = [
        ZonalStatistic::Count,
        ZonalStatistic::Sum,
        ZonalStatistic::Mean,
        ZonalStatistic::Min,
        ZonalStatistic::Max,
        ZonalStatistic::Std,
        ZonalStatistic::Pixels,
        ZonalStatistic::Nodata,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ZonalStatistic::Count => "count",
            ZonalStatistic::Sum => "sum",
            ZonalStatistic::Mean => "mean",
            ZonalStatistic::Min => "min",
            ZonalStatistic::Max => "max",
            ZonalStatistic::Std => "std",
            ZonalStatistic::Pixels => "pixels",
            ZonalStatistic::Nodata => "nodata",
        }
    }

    /// Whether the value is a pixel tally (always present) rather than a
    /// statistic that is null for an empty selection
    pub fn is_count(&self) -> bool {
        matches!(
            self,
            ZonalStatistic::Count | ZonalStatistic::Pixels | ZonalStatistic::Nodata
        )
    }
}

/// Statistics of one feature against one raster band
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZonalStats {
    /// Valid pixels the statistics were computed from
    pub count: usize,
    /// Pixels selected by the mask
    pub pixels: usize,
    /// Selected pixels excluded as nodata or non-finite
    pub nodata: usize,
    pub sum: Option<f64>,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Population standard deviation
    pub std: Option<f64>,
}

/// Whether a pixel value is an observation
#[inline]
pub fn is_valid(value: f64, nodata: Option<f64>) -> bool {
    value.is_finite() && nodata.map_or(true, |nd| value != nd)
}

impl ZonalStats {
    /// Record for a raster that could not be read
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Compute from a slice of already validated values
    pub fn from_values(values: &[f64], pixels: usize) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                count: 0,
                pixels,
                nodata: pixels,
                ..Self::default()
            };
        }

        let sum: f64 = values.iter().sum();
        let mean = sum / count as f64;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            count,
            pixels,
            nodata: pixels - count,
            sum: Some(sum),
            mean: Some(mean),
            min: Some(min),
            max: Some(max),
            std: Some(var.sqrt()),
        }
    }

    /// Compute over the pixels where `mask` is true, excluding nodata
    pub fn from_masked(values: &Array2<f64>, mask: &Array2<bool>, nodata: Option<f64>) -> Self {
        let mut selected = Vec::new();
        let mut pixels = 0usize;
        Zip::from(values).and(mask).for_each(|&v, &m| {
            if m {
                pixels += 1;
                if is_valid(v, nodata) {
                    selected.push(v);
                }
            }
        });
        Self::from_values(&selected, pixels)
    }

    /// True when no valid pixel was selected
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, stat: ZonalStatistic) -> Option<f64> {
        match stat {
            ZonalStatistic::Count => Some(self.count as f64),
            ZonalStatistic::Pixels => Some(self.pixels as f64),
            ZonalStatistic::Nodata => Some(self.nodata as f64),
            ZonalStatistic::Sum => self.sum,
            ZonalStatistic::Mean => self.mean,
            ZonalStatistic::Min => self.min,
            ZonalStatistic::Max => self.max,
            ZonalStatistic::Std => self.std,
        }
    }

    /// Attribute value of one statistic; tallies are integers, the rest
    /// floats or null
    pub fn value(&self, stat: ZonalStatistic) -> AttributeValue {
        match stat {
            ZonalStatistic::Count => AttributeValue::Int(self.count as i64),
            ZonalStatistic::Pixels => AttributeValue::Int(self.pixels as i64),
            ZonalStatistic::Nodata => AttributeValue::Int(self.nodata as i64),
            other => AttributeValue::from_f64(self.get(other)),
        }
    }
}
