use std::cmp::Ordering;

use thiserror::Error;

use crate::data::grouping::{resolve_groups, Grouping};
use crate::data::model::{DataError, FeatureMatrix, SpatialDataset};

/// Groups with fewer observations than this are skipped for every feature.
pub const MIN_OBSERVATIONS: usize = 20;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Percentile thresholds for the signal (top) and noise (bottom) slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnrParams {
    pub top_percentile: u32,
    pub bottom_percentile: u32,
}

impl Default for SnrParams {
    fn default() -> Self {
        Self {
            top_percentile: 20,
            bottom_percentile: 10,
        }
    }
}

impl SnrParams {
    pub const MIN_PERCENTILE: u32 = 1;
    pub const MAX_PERCENTILE: u32 = 100;

    pub fn new(top_percentile: u32, bottom_percentile: u32) -> Self {
        Self {
            top_percentile,
            bottom_percentile,
        }
    }

    /// Both percentiles must lie in `1..=100`. Overlapping slices are allowed.
    pub fn validate(&self) -> Result<(), SnrError> {
        for (name, value) in [
            ("top", self.top_percentile),
            ("bottom", self.bottom_percentile),
        ] {
            if !(Self::MIN_PERCENTILE..=Self::MAX_PERCENTILE).contains(&value) {
                return Err(SnrError::InvalidPercentile { name, value });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// SNR of one feature within one group. `snr` is NaN when undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct SnrRecord {
    pub sample: String,
    pub protein: String,
    pub snr: f64,
}

/// All records produced by one computation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnrResultSet {
    pub records: Vec<SnrRecord>,
}

impl SnrResultSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SnrRecord> {
        self.records.iter()
    }

    /// Distinct sample labels in the order they first appear.
    pub fn samples(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for r in &self.records {
            if !out.contains(&r.sample.as_str()) {
                out.push(&r.sample);
            }
        }
        out
    }

    /// Distinct protein names in the order they first appear.
    pub fn proteins(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for r in &self.records {
            if !out.contains(&r.protein.as_str()) {
                out.push(&r.protein);
            }
        }
        out
    }
}

impl<'a> IntoIterator for &'a SnrResultSet {
    type Item = &'a SnrRecord;
    type IntoIter = std::slice::Iter<'a, SnrRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnrError {
    #[error("{name} percentile must be between 1 and 100, got {value}")]
    InvalidPercentile { name: &'static str, value: u32 },

    #[error("Matrix access failed: {0}")]
    Data(#[from] DataError),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Compute the top/bottom percentile mean ratio for every (group, feature).
///
/// Pairs with fewer than [`MIN_OBSERVATIONS`] values are omitted. Any error
/// aborts the whole computation; there are no partial results.
pub fn compute_snr(
    dataset: &SpatialDataset,
    params: SnrParams,
    grouping: &Grouping,
) -> Result<SnrResultSet, SnrError> {
    params.validate()?;

    let matrix = &dataset.matrix;
    let groups = resolve_groups(dataset, grouping);
    // A numeric sample-ID column used for grouping is not a protein.
    let grouping_feature = match grouping {
        Grouping::Column(name) if dataset.is_measurement_grouping(name) => Some(name.as_str()),
        _ => None,
    };
    let mut records = Vec::new();

    for group in &groups {
        for (feature, protein) in matrix.feature_names().iter().enumerate() {
            if grouping_feature == Some(protein.as_str()) {
                continue;
            }
            let mut values = matrix.values_for_feature(feature, &group.observations)?;
            if values.len() < MIN_OBSERVATIONS {
                log::debug!(
                    "Skipping {}/{protein}: {} observations < {MIN_OBSERVATIONS}",
                    group.label,
                    values.len()
                );
                continue;
            }
            records.push(SnrRecord {
                sample: group.label.clone(),
                protein: protein.clone(),
                snr: snr_of_values(&mut values, params),
            });
        }
    }

    Ok(SnrResultSet { records })
}

/// [`compute_snr`] with failures logged and reported as an empty result set.
pub fn compute_snr_or_empty(
    dataset: &SpatialDataset,
    params: SnrParams,
    grouping: &Grouping,
) -> SnrResultSet {
    match compute_snr(dataset, params, grouping) {
        Ok(results) => results,
        Err(e) => {
            log::error!("Error calculating SNR: {e}");
            SnrResultSet::default()
        }
    }
}

/// SNR of one feature's values. Sorts `values` in place.
fn snr_of_values(values: &mut [f64], params: SnrParams) -> f64 {
    values.sort_by(nan_last);
    let n = values.len();
    let top_len = n * params.top_percentile as usize / 100;
    let bottom_len = n * params.bottom_percentile as usize / 100;

    let top_mean = mean(&values[n - top_len..]);
    let bottom_mean = mean(&values[..bottom_len]);

    if bottom_mean == 0.0 {
        f64::NAN
    } else {
        top_mean / bottom_mean
    }
}

/// Ascending order with NaN sorted after every number.
fn nan_last(a: &f64, b: &f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.total_cmp(b),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    }
}

/// Arithmetic mean; NaN for an empty slice.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
