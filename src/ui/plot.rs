use eframe::egui::Ui;
use egui_plot::{Bar, BarChart, Legend, Plot};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// SNR bar chart (central panel)
// ---------------------------------------------------------------------------

/// Render one bar per (sample, protein), grouped by protein along the x axis.
/// Undefined ratios get no bar.
pub fn snr_chart(ui: &mut Ui, state: &AppState) {
    let results = &state.results;
    let samples = results.samples();
    let proteins: Vec<String> = results.proteins().into_iter().map(str::to_string).collect();

    let n_samples = samples.len().max(1) as f64;
    let bar_width = 0.8 / n_samples;

    let charts: Vec<BarChart> = samples
        .iter()
        .enumerate()
        .map(|(s_idx, sample)| {
            let offset = (s_idx as f64 - (n_samples - 1.0) / 2.0) * bar_width;
            let bars: Vec<Bar> = results
                .iter()
                .filter(|r| r.sample == *sample && !r.snr.is_nan())
                .filter_map(|r| {
                    let p_idx = proteins.iter().position(|p| *p == r.protein)?;
                    Some(
                        Bar::new(p_idx as f64 + offset, r.snr)
                            .width(bar_width)
                            .name(format!("{sample} / {}", r.protein)),
                    )
                })
                .collect();
            BarChart::new(bars)
                .name(*sample)
                .color(state.sample_colors.color_for(sample))
        })
        .collect();

    Plot::new("snr_chart")
        .legend(Legend::default())
        .x_axis_label("Protein")
        .y_axis_label("SNR")
        .x_axis_formatter(move |mark, _range| {
            let idx = mark.value.round();
            if (mark.value - idx).abs() > f64::EPSILON || idx < 0.0 {
                return String::new();
            }
            proteins.get(idx as usize).cloned().unwrap_or_default()
        })
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for chart in charts {
                plot_ui.bar_chart(chart);
            }
        });
}
