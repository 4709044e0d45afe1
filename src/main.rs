mod app;
mod color;
mod config;
mod data;
mod state;
mod ui;

use std::path::PathBuf;

use app::SalesDashApp;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let config = config::load_config().unwrap_or_else(|e| {
        log::error!("Ignoring config: {e:#}");
        config::Config::default()
    });

    // A positional argument overrides the configured data file.
    let data_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.data.path.clone());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Sales Dashboard",
        options,
        Box::new(move |_cc| Ok(Box::new(SalesDashApp::new(config, &data_path)))),
    )
}
