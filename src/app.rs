use std::path::Path;

use eframe::egui;

use crate::config::Config;
use crate::state::AppState;
use crate::ui::panels;

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct SalesDashApp {
    pub state: AppState,
}

impl SalesDashApp {
    /// Build the app and load the dataset the session starts with.
    pub fn new(config: Config, data_path: &Path) -> Self {
        let mut state = AppState::new(config);
        state.open(data_path);
        Self { state }
    }
}

impl eframe::App for SalesDashApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: KPIs + tabs ----
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    panels::central_panel(ui, &mut self.state);
                });
        });
    }
}
