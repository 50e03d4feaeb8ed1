use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::color::SampleColors;
use crate::data::grouping::Grouping;
use crate::data::model::SpatialDataset;
use crate::snr::{SnrParams, SnrResultSet, compute_snr_or_empty};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Loaded dataset (None until user loads a file).
    pub dataset: Option<SpatialDataset>,

    /// Path the dataset was loaded from, for the status line.
    pub source_path: Option<PathBuf>,

    /// Percentile sliders.
    pub params: SnrParams,

    /// Which observation column groups cells into samples.
    pub grouping: Grouping,

    /// Output of the last computation.
    pub results: SnrResultSet,

    /// One colour per sample in `results`.
    pub sample_colors: SampleColors,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            dataset: None,
            source_path: None,
            params: SnrParams::default(),
            grouping: Grouping::Single,
            results: SnrResultSet::default(),
            sample_colors: SampleColors::default(),
            status_message: None,
        }
    }
}

impl AppState {
    /// Ingest a newly loaded dataset and compute with the current settings.
    pub fn set_dataset(&mut self, dataset: SpatialDataset, path: Option<PathBuf>) {
        // A grouping column from a previous file may not exist any more.
        if let Grouping::Column(col) = &self.grouping {
            if !dataset.grouping_columns().contains(&col.as_str()) {
                self.grouping = Grouping::Single;
            }
        }
        self.dataset = Some(dataset);
        self.source_path = path;
        self.status_message = Some("File loaded successfully!".to_string());
        self.recompute();
    }

    /// Load a file, replacing the current dataset. On failure the previous
    /// dataset is kept and the error is shown.
    pub fn load_path(&mut self, path: &Path) {
        match crate::data::loader::load_file(path) {
            Ok(dataset) => {
                log::info!(
                    "Loaded {} observations × {} proteins with metadata columns {:?}",
                    dataset.len(),
                    dataset.feature_names().len(),
                    dataset.obs_columns
                );
                self.set_dataset(dataset, Some(path.to_path_buf()));
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Rerun the SNR computation for the current dataset and settings.
    pub fn recompute(&mut self) {
        let Some(ds) = &self.dataset else {
            self.results = SnrResultSet::default();
            self.sample_colors = SampleColors::default();
            return;
        };
        self.results = compute_snr_or_empty(ds, self.params, &self.grouping);
        self.sample_colors = SampleColors::new(self.results.samples());
        log::info!(
            "Computed {} SNR values (top {}%, bottom {}%, grouping: {})",
            self.results.len(),
            self.params.top_percentile,
            self.params.bottom_percentile,
            self.grouping
        );
    }

    pub fn set_params(&mut self, params: SnrParams) {
        if params != self.params {
            self.params = params;
            self.recompute();
        }
    }

    pub fn set_grouping(&mut self, grouping: Grouping) {
        if grouping != self.grouping {
            self.grouping = grouping;
            self.recompute();
        }
    }

    /// Grouping selector entries: the sentinel, then every column that can
    /// partition observations.
    pub fn grouping_options(&self) -> Vec<Grouping> {
        let mut options = vec![Grouping::Single];
        if let Some(ds) = &self.dataset {
            options.extend(
                ds.grouping_columns()
                    .into_iter()
                    .map(|c| Grouping::Column(c.to_string())),
            );
        }
        options
    }

    /// Write the current results as CSV.
    pub fn export_csv(&self, path: &Path) -> Result<()> {
        crate::export::save_csv(path, &self.results)?;
        log::info!("Exported {} rows to {}", self.results.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{ExpressionMatrix, MetadataValue};

    fn dataset() -> SpatialDataset {
        let n = 50;
        let cd3: Vec<f64> = (0..n).map(|i| i as f64 + 1.0).collect();
        let matrix = ExpressionMatrix::from_columns(vec!["CD3".into()], vec![cd3]).unwrap();
        let image = (0..n)
            .map(|i| MetadataValue::Integer(if i < 25 { 1 } else { 2 }))
            .collect();
        SpatialDataset::new(matrix, vec![("ImageID".into(), image)]).unwrap()
    }

    #[test]
    fn loading_computes_with_defaults() {
        let mut state = AppState::default();
        state.set_dataset(dataset(), None);
        assert_eq!(state.results.samples(), vec!["SingleSample"]);
        assert_eq!(state.results.len(), 1);
    }

    #[test]
    fn changing_grouping_recomputes() {
        let mut state = AppState::default();
        state.set_dataset(dataset(), None);
        state.set_grouping(Grouping::Column("ImageID".into()));
        assert_eq!(state.results.samples(), vec!["1", "2"]);

        state.set_params(SnrParams::new(10, 10));
        assert_eq!(state.results.len(), 2);
    }

    #[test]
    fn stale_grouping_is_reset_on_new_dataset() {
        let mut state = AppState::default();
        state.grouping = Grouping::Column("slide".into());
        state.set_dataset(dataset(), None);
        assert_eq!(state.grouping, Grouping::Single);
        // Single Sample, ImageID, then the CD3 measurement column.
        assert_eq!(state.grouping_options().len(), 3);
    }

    #[test]
    fn successful_load_reports_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.csv");
        let mut csv = String::from("ImageID,CD3\n");
        for i in 0..60 {
            csv.push_str(&format!("{},{}\n", if i < 30 { 1 } else { 2 }, i + 1));
        }
        std::fs::write(&path, csv).unwrap();

        let mut state = AppState::default();
        state.load_path(&path);
        assert_eq!(state.status_message.as_deref(), Some("File loaded successfully!"));

        let options = state.grouping_options();
        assert!(options.contains(&Grouping::Column("ImageID".into())));
        state.set_grouping(Grouping::Column("ImageID".into()));
        assert_eq!(state.results.samples(), vec!["1", "2"]);
        assert_eq!(state.results.proteins(), vec!["CD3"]);
    }

    #[test]
    fn load_failure_keeps_previous_dataset() {
        let mut state = AppState::default();
        state.set_dataset(dataset(), None);
        state.load_path(Path::new("/nonexistent/cells.parquet"));
        assert!(state.dataset.is_some());
        assert!(state.status_message.as_deref().unwrap().starts_with("Error:"));
    }
}
