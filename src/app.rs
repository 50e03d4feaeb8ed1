use eframe::egui::{self, Color32, RichText, Ui};

use crate::state::AppState;
use crate::ui::{panels, plot, table};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct SnrApp {
    pub state: AppState,
}

impl eframe::App for SnrApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: percentile and sample settings ----
        egui::SidePanel::left("settings_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: chart and table ----
        egui::CentralPanel::default().show(ctx, |ui| {
            results_view(ui, &self.state);
        });
    }
}

fn results_view(ui: &mut Ui, state: &AppState) {
    if state.dataset.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to begin  (File → Open…)");
        });
        return;
    }

    ui.heading("Signal-to-Noise Ratio (SNR)");
    if state.results.is_empty() {
        ui.label(
            RichText::new(
                "SNR calculation did not return any results. Check your data and settings.",
            )
            .color(Color32::YELLOW),
        );
        return;
    }
    ui.label(RichText::new("SNR calculation complete!").color(Color32::GREEN));
    ui.separator();

    let chart_height = (ui.available_height() * 0.45).max(160.0);
    ui.allocate_ui(egui::vec2(ui.available_width(), chart_height), |ui: &mut Ui| {
        plot::snr_chart(ui, state);
    });
    ui.separator();
    table::results_table(ui, state);
}
