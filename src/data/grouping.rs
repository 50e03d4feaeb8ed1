use std::collections::HashMap;
use std::fmt;

use super::model::{MetadataValue, SpatialDataset};

/// Label used when all observations form one implicit group.
pub const SINGLE_SAMPLE_LABEL: &str = "SingleSample";

// ---------------------------------------------------------------------------
// Grouping choice
// ---------------------------------------------------------------------------

/// How observations are partitioned before computing SNR.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Grouping {
    /// Every observation belongs to one group.
    #[default]
    Single,
    /// Partition by the values of an observation metadata column.
    Column(String),
}

impl Grouping {
    /// Sentinel shown in the grouping selector for [`Grouping::Single`].
    pub const SINGLE_SAMPLE_OPTION: &'static str = "Single Sample";
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grouping::Single => write!(f, "{}", Self::SINGLE_SAMPLE_OPTION),
            Grouping::Column(c) => write!(f, "{c}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Partitioning
// ---------------------------------------------------------------------------

/// One partition of observations sharing a label.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationGroup {
    pub label: String,
    pub observations: Vec<usize>,
}

/// Split the dataset's observations into labelled groups.
///
/// Groups come out in the order their label first appears. Observations with
/// a null label belong to no group. Numeric columns group by their values.
/// [`Grouping::Single`], or a column the dataset does not have, yields one
/// group labelled [`SINGLE_SAMPLE_LABEL`].
pub fn resolve_groups(dataset: &SpatialDataset, grouping: &Grouping) -> Vec<ObservationGroup> {
    let column = match grouping {
        Grouping::Single => None,
        Grouping::Column(name) => match dataset.group_labels(name) {
            Some(values) => Some(values),
            None => {
                log::warn!(
                    "'{name}' not found in observation metadata. Proceeding as single-sample."
                );
                None
            }
        },
    };

    let Some(values) = column else {
        return vec![ObservationGroup {
            label: SINGLE_SAMPLE_LABEL.to_string(),
            observations: (0..dataset.len()).collect(),
        }];
    };

    let mut index: HashMap<&MetadataValue, usize> = HashMap::new();
    let mut groups: Vec<ObservationGroup> = Vec::new();
    for (obs, value) in values.iter().enumerate() {
        if value.is_null() {
            continue;
        }
        let slot = *index.entry(value).or_insert_with(|| {
            groups.push(ObservationGroup {
                label: value.to_string(),
                observations: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].observations.push(obs);
    }
    groups
}
