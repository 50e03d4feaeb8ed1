use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in an observation metadata column
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value mirroring common DataFrame dtypes.
/// Using `BTreeMap` / `BTreeSet` downstream so `MetadataValue` must be `Ord`.
#[derive(Debug, Clone)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord/Hash so we can put MetadataValue in sets and maps --
// Equality follows `cmp`: floats compare by `total_cmp`, so NaN == NaN.

impl PartialEq for MetadataValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetadataValue::*;
        fn discriminant(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for MetadataValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MetadataValue::String(s) => s.hash(state),
            MetadataValue::Integer(i) => i.hash(state),
            MetadataValue::Float(f) => f.to_bits().hash(state),
            MetadataValue::Bool(b) => b.hash(state),
            MetadataValue::Null => {}
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, MetadataValue::Null)
    }

    /// Label for a numeric measurement used as a grouping key: whole numbers
    /// become integers so `3.0` reads as sample `3`, NaN becomes null.
    pub fn from_measurement(v: f64) -> Self {
        if v.is_nan() {
            MetadataValue::Null
        } else if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
            MetadataValue::Integer(v as i64)
        } else {
            MetadataValue::Float(v)
        }
    }
}

// ---------------------------------------------------------------------------
// Errors raised while assembling a dataset
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Metadata column '{column}' has {actual} entries, expected {expected}")]
    MetadataLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Feature index {index} out of range ({n_features} features)")]
    FeatureOutOfRange { index: usize, n_features: usize },

    #[error("Observation index {index} out of range ({n_observations} observations)")]
    ObservationOutOfRange { index: usize, n_observations: usize },
}

// ---------------------------------------------------------------------------
// FeatureMatrix – what the SNR engine needs from a measurement container
// ---------------------------------------------------------------------------

/// Read access to an observations × features measurement matrix.
pub trait FeatureMatrix {
    fn n_observations(&self) -> usize;

    fn n_features(&self) -> usize;

    /// Feature identifiers in column order.
    fn feature_names(&self) -> &[String];

    /// Values of one feature for the given observations, in the order the
    /// observation indices are supplied.
    fn values_for_feature(
        &self,
        feature: usize,
        observations: &[usize],
    ) -> Result<Vec<f64>, DataError>;
}

// ---------------------------------------------------------------------------
// ExpressionMatrix – dense row-major storage
// ---------------------------------------------------------------------------

/// Dense measurement matrix, one row per observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionMatrix {
    values: Vec<f64>,
    n_observations: usize,
    feature_names: Vec<String>,
}

impl ExpressionMatrix {
    /// Build from row-major `values` (`n_observations * feature_names.len()`).
    pub fn new(
        values: Vec<f64>,
        n_observations: usize,
        feature_names: Vec<String>,
    ) -> Result<Self, DataError> {
        let expected = n_observations * feature_names.len();
        if values.len() != expected {
            return Err(DataError::DimensionMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            values,
            n_observations,
            feature_names,
        })
    }

    /// Build from per-feature columns of equal length.
    pub fn from_columns(
        feature_names: Vec<String>,
        columns: Vec<Vec<f64>>,
    ) -> Result<Self, DataError> {
        if columns.len() != feature_names.len() {
            return Err(DataError::DimensionMismatch {
                expected: feature_names.len(),
                actual: columns.len(),
            });
        }
        let n_observations = columns.first().map_or(0, Vec::len);
        let n_features = columns.len();
        let mut values = vec![0.0; n_observations * n_features];
        for (j, column) in columns.iter().enumerate() {
            if column.len() != n_observations {
                return Err(DataError::DimensionMismatch {
                    expected: n_observations,
                    actual: column.len(),
                });
            }
            for (i, &v) in column.iter().enumerate() {
                values[i * n_features + j] = v;
            }
        }
        Self::new(values, n_observations, feature_names)
    }

    pub fn get(&self, observation: usize, feature: usize) -> f64 {
        self.values[observation * self.feature_names.len() + feature]
    }
}

impl FeatureMatrix for ExpressionMatrix {
    fn n_observations(&self) -> usize {
        self.n_observations
    }

    fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn values_for_feature(
        &self,
        feature: usize,
        observations: &[usize],
    ) -> Result<Vec<f64>, DataError> {
        let n_features = self.n_features();
        if feature >= n_features {
            return Err(DataError::FeatureOutOfRange {
                index: feature,
                n_features,
            });
        }
        observations
            .iter()
            .map(|&obs| {
                if obs >= self.n_observations {
                    Err(DataError::ObservationOutOfRange {
                        index: obs,
                        n_observations: self.n_observations,
                    })
                } else {
                    Ok(self.get(obs, feature))
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// SpatialDataset – the complete loaded dataset
// ---------------------------------------------------------------------------

/// Measurement matrix plus per-observation metadata columns.
#[derive(Debug, Clone)]
pub struct SpatialDataset {
    pub matrix: ExpressionMatrix,
    /// Ordered list of observation metadata column names.
    pub obs_columns: Vec<String>,
    /// column_name → one value per observation.
    pub obs: BTreeMap<String, Vec<MetadataValue>>,
    /// For each metadata column the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<MetadataValue>>,
    /// Distinct value count of every column usable for grouping.
    unique_counts: BTreeMap<String, usize>,
}

impl SpatialDataset {
    /// Assemble a dataset, checking that every metadata column covers every
    /// observation. `obs_columns` keeps the order columns were supplied in.
    pub fn new(
        matrix: ExpressionMatrix,
        obs_columns: Vec<(String, Vec<MetadataValue>)>,
    ) -> Result<Self, DataError> {
        let n = matrix.n_observations();
        let mut names = Vec::with_capacity(obs_columns.len());
        let mut obs = BTreeMap::new();
        let mut unique_values: BTreeMap<String, BTreeSet<MetadataValue>> = BTreeMap::new();

        for (name, values) in obs_columns {
            if values.len() != n {
                return Err(DataError::MetadataLength {
                    column: name,
                    expected: n,
                    actual: values.len(),
                });
            }
            unique_values.insert(name.clone(), values.iter().cloned().collect());
            names.push(name.clone());
            obs.insert(name, values);
        }

        let mut unique_counts: BTreeMap<String, usize> = unique_values
            .iter()
            .map(|(name, vals)| (name.clone(), vals.len()))
            .collect();
        for (feature, name) in matrix.feature_names().iter().enumerate() {
            if unique_counts.contains_key(name) {
                continue;
            }
            let distinct: BTreeSet<MetadataValue> = (0..n)
                .map(|obs| MetadataValue::from_measurement(matrix.get(obs, feature)))
                .collect();
            unique_counts.insert(name.clone(), distinct.len());
        }

        Ok(SpatialDataset {
            matrix,
            obs_columns: names,
            obs,
            unique_values,
            unique_counts,
        })
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.matrix.n_observations()
    }

    /// Whether the dataset has no observations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn feature_names(&self) -> &[String] {
        self.matrix.feature_names()
    }

    pub fn obs_column(&self, name: &str) -> Option<&[MetadataValue]> {
        self.obs.get(name).map(Vec::as_slice)
    }

    fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names().iter().position(|f| f == name)
    }

    /// Columns that can partition observations: metadata columns first, then
    /// numeric columns (integer sample IDs often load as measurements).
    pub fn grouping_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = self.obs_columns.iter().map(String::as_str).collect();
        for name in self.feature_names() {
            if !self.obs.contains_key(name) {
                columns.push(name);
            }
        }
        columns
    }

    /// One label per observation for `column`, or `None` if no such column.
    pub fn group_labels(&self, column: &str) -> Option<Cow<'_, [MetadataValue]>> {
        if let Some(values) = self.obs_column(column) {
            return Some(Cow::Borrowed(values));
        }
        let feature = self.feature_index(column)?;
        let labels = (0..self.len())
            .map(|obs| MetadataValue::from_measurement(self.matrix.get(obs, feature)))
            .collect();
        Some(Cow::Owned(labels))
    }

    /// Whether grouping by `column` consumes a measurement column, which then
    /// must not be reported as a protein.
    pub fn is_measurement_grouping(&self, column: &str) -> bool {
        !self.obs.contains_key(column) && self.feature_index(column).is_some()
    }

    /// Number of distinct values in a grouping column.
    pub fn n_unique(&self, column: &str) -> Option<usize> {
        self.unique_counts.get(column).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("P{i}")).collect()
    }

    #[test]
    fn new_rejects_wrong_length() {
        let err = ExpressionMatrix::new(vec![1.0; 5], 2, names(3)).unwrap_err();
        assert_eq!(
            err,
            DataError::DimensionMismatch {
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn from_columns_is_row_major() {
        let m = ExpressionMatrix::from_columns(
            names(2),
            vec![vec![1.0, 2.0, 3.0], vec![10.0, 20.0, 30.0]],
        )
        .unwrap();
        assert_eq!(m.n_observations(), 3);
        assert_eq!(m.n_features(), 2);
        assert_eq!(m.get(1, 0), 2.0);
        assert_eq!(m.get(2, 1), 30.0);
    }

    #[test]
    fn values_for_feature_follows_subset_order() {
        let m = ExpressionMatrix::from_columns(names(1), vec![vec![5.0, 6.0, 7.0]]).unwrap();
        assert_eq!(m.values_for_feature(0, &[2, 0]).unwrap(), vec![7.0, 5.0]);
        assert!(matches!(
            m.values_for_feature(1, &[0]),
            Err(DataError::FeatureOutOfRange { .. })
        ));
        assert!(matches!(
            m.values_for_feature(0, &[3]),
            Err(DataError::ObservationOutOfRange { .. })
        ));
    }

    #[test]
    fn dataset_checks_metadata_length() {
        let m = ExpressionMatrix::from_columns(names(1), vec![vec![1.0, 2.0]]).unwrap();
        let err = SpatialDataset::new(
            m,
            vec![("ImageID".into(), vec![MetadataValue::Integer(1)])],
        )
        .unwrap_err();
        assert!(matches!(err, DataError::MetadataLength { .. }));
    }

    #[test]
    fn float_equality_matches_ordering() {
        let nan = MetadataValue::Float(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert_eq!(nan.cmp(&nan.clone()), std::cmp::Ordering::Equal);
        assert_ne!(MetadataValue::Float(1.0), MetadataValue::Integer(1));

        let values = vec![nan.clone(), nan, MetadataValue::Float(2.0)];
        let set: BTreeSet<MetadataValue> = values.iter().cloned().collect();
        let hashed: std::collections::HashSet<MetadataValue> = values.into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(hashed.len(), 2);
    }

    #[test]
    fn measurement_columns_are_grouping_candidates() {
        let m = ExpressionMatrix::from_columns(
            vec!["ImageID".into(), "CD3".into()],
            vec![vec![1.0, 1.0, 2.0, f64::NAN], vec![0.5, 1.5, 2.5, 3.5]],
        )
        .unwrap();
        let ds = SpatialDataset::new(
            m,
            vec![("region".into(), vec![MetadataValue::String("tumor".into()); 4])],
        )
        .unwrap();
        assert_eq!(ds.grouping_columns(), vec!["region", "ImageID", "CD3"]);
        assert_eq!(
            ds.group_labels("ImageID").unwrap().as_ref(),
            [
                MetadataValue::Integer(1),
                MetadataValue::Integer(1),
                MetadataValue::Integer(2),
                MetadataValue::Null
            ]
        );
        assert!(ds.is_measurement_grouping("ImageID"));
        assert!(!ds.is_measurement_grouping("region"));
        assert!(ds.group_labels("slide").is_none());
        assert_eq!(ds.n_unique("ImageID"), Some(3));
        assert_eq!(ds.n_unique("region"), Some(1));
    }

    #[test]
    fn dataset_keeps_column_order_and_uniques() {
        let m = ExpressionMatrix::from_columns(names(1), vec![vec![1.0, 2.0, 3.0]]).unwrap();
        let ds = SpatialDataset::new(
            m,
            vec![
                (
                    "sample".into(),
                    vec![
                        MetadataValue::String("b".into()),
                        MetadataValue::String("a".into()),
                        MetadataValue::String("b".into()),
                    ],
                ),
                ("area".into(), vec![MetadataValue::Float(1.5); 3]),
            ],
        )
        .unwrap();
        assert_eq!(ds.obs_columns, vec!["sample", "area"]);
        assert_eq!(ds.unique_values["sample"].len(), 2);
        assert_eq!(ds.len(), 3);
    }
}
