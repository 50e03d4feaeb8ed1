use eframe::egui::{self, Color32, RichText, Ui};

use crate::data::grouping::Grouping;
use crate::export::DEFAULT_FILE_NAME;
use crate::state::AppState;

/// Percentile range offered by the sliders.
const SLIDER_RANGE: std::ops::RangeInclusive<u32> = 1..=50;

// ---------------------------------------------------------------------------
// Left side panel – parameter widgets
// ---------------------------------------------------------------------------

/// Render the left settings panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Settings");
    ui.separator();

    if state.dataset.is_none() {
        ui.label("No dataset loaded.");
        return;
    }

    // ---- Percentile sliders ----
    let mut params = state.params;
    ui.strong("Top Percentile (%)");
    ui.add(egui::Slider::new(&mut params.top_percentile, SLIDER_RANGE).step_by(1.0));
    ui.add_space(4.0);
    ui.strong("Bottom Percentile (%)");
    ui.add(egui::Slider::new(&mut params.bottom_percentile, SLIDER_RANGE).step_by(1.0));
    state.set_params(params);
    ui.separator();

    // ---- Sample ID selector ----
    ui.strong("Sample ID column");
    ui.label(
        RichText::new("Choose 'Single Sample' if the file holds one sample.")
            .small()
            .weak(),
    );
    let current = state.grouping.clone();
    let mut selected = current.clone();
    egui::ComboBox::from_id_salt("sample_column")
        .selected_text(current.to_string())
        .show_ui(ui, |ui: &mut Ui| {
            for option in state.grouping_options() {
                let label = match (&option, &state.dataset) {
                    (Grouping::Column(col), Some(ds)) => {
                        let n = ds.n_unique(col).unwrap_or(0);
                        format!("{col}  ({n} values)")
                    }
                    _ => option.to_string(),
                };
                ui.selectable_value(&mut selected, option, label);
            }
        });
    state.set_grouping(selected);
    ui.separator();

    if let Some(ds) = &state.dataset {
        ui.label(format!("{} proteins", ds.feature_names().len()));
        ui.label(format!("{} samples with results", state.results.samples().len()));
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            let can_export = !state.results.is_empty();
            if ui
                .add_enabled(can_export, egui::Button::new("Export CSV…"))
                .clicked()
            {
                save_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(ds) = &state.dataset {
            let name = state
                .source_path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            ui.label(format!(
                "{name}: {} observations, {} proteins",
                ds.len(),
                ds.feature_names().len()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            let color = if msg.starts_with("Error") {
                Color32::RED
            } else {
                Color32::GREEN
            };
            ui.label(RichText::new(msg).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open spatial omics data")
        .add_filter("Supported files", &["parquet", "pq", "csv", "json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .pick_file();

    if let Some(path) = file {
        state.load_path(&path);
    }
}

pub fn save_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Download SNR results")
        .set_file_name(DEFAULT_FILE_NAME)
        .add_filter("CSV", &["csv"])
        .save_file();

    if let Some(path) = file {
        state.status_message = Some(match state.export_csv(&path) {
            Ok(()) => format!("Saved {}", path.display()),
            Err(e) => {
                log::error!("Failed to export results: {e:#}");
                format!("Error: {e:#}")
            }
        });
    }
}
