use eframe::egui::{RichText, Ui};
use egui_extras::{Column, TableBuilder};

use crate::state::AppState;

const ROW_HEIGHT: f32 = 18.0;

// ---------------------------------------------------------------------------
// Results table
// ---------------------------------------------------------------------------

/// Render the `Sample | Protein | SNR` table.
pub fn results_table(ui: &mut Ui, state: &AppState) {
    let records = &state.results.records;

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .column(Column::auto().at_least(120.0))
        .column(Column::auto().at_least(120.0))
        .column(Column::remainder())
        .header(ROW_HEIGHT + 4.0, |mut header| {
            for title in ["Sample", "Protein", "SNR"] {
                header.col(|ui: &mut Ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|body| {
            body.rows(ROW_HEIGHT, records.len(), |mut row| {
                let rec = &records[row.index()];
                row.col(|ui: &mut Ui| {
                    let color = state.sample_colors.color_for(&rec.sample);
                    ui.label(RichText::new(&rec.sample).color(color));
                });
                row.col(|ui: &mut Ui| {
                    ui.label(&rec.protein);
                });
                row.col(|ui: &mut Ui| {
                    ui.monospace(format_snr(rec.snr));
                });
            });
        });
}

fn format_snr(snr: f64) -> String {
    if snr.is_nan() {
        "NaN".to_string()
    } else {
        format!("{snr:.4}")
    }
}
