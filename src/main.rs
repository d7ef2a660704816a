// src/main.rs
mod app;
mod data;
mod geometry;
mod landmarks;
mod mediapipe_bridge;
mod pipeline;
mod scene;
mod settings;
mod tracking;
mod ui;
mod video;

use eframe::egui;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::settings::AppSettings;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Ok(p) = std::env::current_exe() {
        info!("Running from: {}", p.display());
    }

    match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
        Ok(cameras) => {
            info!("Found {} camera(s)", cameras.len());
            for (i, camera) in cameras.iter().enumerate() {
                info!("  [{}] {}", i, camera.human_name());
            }
        }
        Err(e) => warn!("Failed to query cameras: {}", e),
    }

    let settings = AppSettings::load().unwrap_or_else(|e| {
        warn!("Using default settings: {:#}", e);
        AppSettings::default()
    });

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return;
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([960.0, 600.0]),
        centered: true,
        ..Default::default()
    };

    let result = eframe::run_native(
        "Wrist Overlay",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(create_visuals());
            Box::new(app::WristOverlayApp::new(cc, runtime, settings))
        }),
    );

    if let Err(e) = result {
        error!("Error running application: {:?}", e);
    }
}

fn create_visuals() -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();

    visuals.widgets.noninteractive.bg_fill = egui::Color32::from_rgb(30, 30, 35);
    visuals.widgets.inactive.bg_fill = egui::Color32::from_rgb(45, 45, 52);
    visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(55, 55, 65);
    visuals.widgets.active.bg_fill = egui::Color32::from_rgb(70, 130, 240);

    visuals.widgets.noninteractive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.inactive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.hovered.rounding = egui::Rounding::same(8.0);
    visuals.widgets.active.rounding = egui::Rounding::same(8.0);

    visuals.window_rounding = egui::Rounding::same(12.0);
    visuals.menu_rounding = egui::Rounding::same(8.0);

    visuals
}
