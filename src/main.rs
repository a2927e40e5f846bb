mod api;
mod app;
mod config;
mod upload;
mod utils;

use eframe::egui;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    init_logging();

    let config = match config::load() {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "falling back to default config");
            config::Config::default()
        }
    };
    info!(server = %config.server_url, "starting kmem gallery");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 720.0])
            .with_min_inner_size([640.0, 480.0]),
        ..Default::default()
    };

    if let Err(err) = eframe::run_native(
        "kmem Gallery",
        options,
        Box::new(move |cc| Box::new(app::KmemGallery::new(cc, config))),
    ) {
        error!(error = %err, "ui loop failed");
    }
}
