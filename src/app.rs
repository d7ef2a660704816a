// src/app.rs
use crate::data::TelemetryExporter;
use crate::mediapipe_bridge::SimulatedLandmarker;
use crate::pipeline::{FramePipeline, TelemetryObserver};
use crate::scene::{MeshAsset, Overlay, PerspectiveCamera, SceneConfig};
use crate::settings::AppSettings;
use crate::tracking::{FrameUpdate, OverlayEngine, OverlayTransform, TrackerConfig};
use crate::ui::{
    draw_hand_skeleton, draw_orientation_dial, draw_overlay_wireframe, draw_tracking_status,
    telemetry_table, Theme, VideoWidget,
};
use crate::video::VideoSource;

use eframe::egui;
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::{error, info};

const SYNTHETIC_SIZE: (u32, u32) = (640, 480);
const SYNTHETIC_FPS: f64 = 30.0;

/// Latest engine output plus the optional session being recorded.
#[derive(Default)]
struct TelemetryState {
    latest: Option<FrameUpdate>,
    applied_frames: u64,
    held_frames: u64,
    recorder: Option<TelemetryExporter>,
}

impl TelemetryObserver for TelemetryState {
    fn on_frame(&mut self, update: &FrameUpdate) {
        if update.applied() {
            self.applied_frames += 1;
        } else {
            self.held_frames += 1;
        }
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.on_frame(update);
        }
        self.latest = Some(update.clone());
    }
}

pub struct WristOverlayApp {
    // Core components
    runtime: Runtime,
    pipeline: FramePipeline<SimulatedLandmarker, SimulatedLandmarker>,
    video_source: VideoSource,
    camera: PerspectiveCamera,
    overlay: Option<Overlay>,

    // UI State
    theme: Theme,
    video_widget: VideoWidget,
    show_settings: bool,
    show_landmarks: bool,
    status_message: Option<String>,

    telemetry: TelemetryState,
    settings: AppSettings,
}

impl WristOverlayApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, runtime: Runtime, settings: AppSettings) -> Self {
        let (video_source, status_message) = open_video_source(&settings);
        let info = video_source.get_info();
        info!("Video source: {} {}x{} @ {:.0} fps", info.name, info.width, info.height, info.fps);

        let engine = OverlayEngine::new(settings.tracker.clone());
        let landmarker = SimulatedLandmarker::default();
        let pipeline = FramePipeline::new(landmarker.clone(), landmarker, engine);

        let aspect = info.width as f64 / info.height.max(1) as f64;
        let camera = PerspectiveCamera::new(&settings.scene, aspect);
        let overlay = load_overlay(&settings.model_path, &settings);

        Self {
            runtime,
            pipeline,
            video_source,
            camera,
            overlay,
            theme: Theme::default(),
            video_widget: VideoWidget::new(),
            show_settings: false,
            show_landmarks: true,
            status_message,
            telemetry: TelemetryState::default(),
            settings,
        }
    }

    /// One redraw cycle: newest frame, detection if the video advanced,
    /// engine step, then hand the transform to the overlay.
    fn step(&mut self, ctx: &egui::Context) {
        let frame = match self.video_source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(e) => {
                error!("Failed to read video frame: {:#}", e);
                self.status_message = Some(format!("Video error: {:#}", e));
                return;
            }
        };

        self.video_widget.update_frame(ctx, &frame.image);

        let previous = self.overlay.as_ref().map(|overlay| overlay.transform);
        let update = self.runtime.block_on(self.pipeline.process(
            &frame,
            previous.as_ref(),
            &self.camera,
            &mut self.telemetry,
        ));

        if let (Some(overlay), Some(transform)) = (self.overlay.as_mut(), update.transform) {
            overlay.transform = transform;
        }
    }

    fn render_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(10.0);
            egui::menu::bar(ui, |ui| {
                ui.heading("Wrist Overlay");

                ui.separator();

                if ui.button("📂 Load model…").clicked() {
                    self.pick_model();
                }
                ui.checkbox(&mut self.show_landmarks, "Hand landmarks");

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("⚙ Settings").clicked() {
                        self.show_settings = !self.show_settings;
                    }
                    if !self.video_source.is_camera() {
                        ui.colored_label(self.theme.warning, "Synthetic feed");
                    }
                });
            });
            ui.add_space(10.0);
        });
    }

    fn render_telemetry_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("telemetry")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| {
                ui.add_space(10.0);
                draw_tracking_status(ui, self.telemetry.latest.as_ref(), &self.theme);
                if let Some(message) = &self.status_message {
                    ui.colored_label(self.theme.error, message);
                }
                if self.overlay.is_none() {
                    ui.colored_label(self.theme.text_secondary, "No overlay model loaded");
                }

                ui.add_space(10.0);
                ui.vertical_centered(|ui| {
                    let degrees = self
                        .telemetry
                        .latest
                        .as_ref()
                        .and_then(|u| u.measurement)
                        .map(|m| m.orientation_degrees);
                    draw_orientation_dial(ui, degrees, &self.theme);
                });

                ui.add_space(10.0);
                ui.group(|ui| {
                    ui.heading("Telemetry");
                    telemetry_table(ui, self.telemetry.latest.as_ref());
                });

                ui.add_space(10.0);
                ui.label(format!(
                    "Frames tracked: {}   held: {}   detections: {}",
                    self.telemetry.applied_frames,
                    self.telemetry.held_frames,
                    self.pipeline.detection_runs()
                ));

                ui.separator();
                self.render_recording_controls(ui);
            });
    }

    fn render_recording_controls(&mut self, ui: &mut egui::Ui) {
        ui.heading("Export Data");

        ui.horizontal(|ui| {
            if let Some(recorder) = &self.telemetry.recorder {
                let stop = ui.add_sized(
                    [140.0, 32.0],
                    egui::Button::new("⏹ Stop & Export").fill(self.theme.error),
                );
                ui.label(format!("{} frames", recorder.frame_count()));
                if stop.clicked() {
                    self.finish_recording();
                }
            } else if ui
                .add_sized(
                    [140.0, 32.0],
                    egui::Button::new("⏺ Record").fill(self.theme.success),
                )
                .clicked()
            {
                let recorder = TelemetryExporter::new(&self.settings.output_directory, None);
                info!("Recording telemetry session {}", recorder.session_name());
                self.telemetry.recorder = Some(recorder);
            }
        });

        if self.telemetry.recorder.is_some() && ui.button("Export CSV as…").clicked() {
            self.export_csv_as();
        }
    }

    fn render_video(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let rect = self.video_widget.show(ui);
            self.camera.set_viewport(rect.width(), rect.height());

            let painter = ui.painter_at(rect);
            if self.show_landmarks {
                if let Some(hand) = &self.pipeline.detections().hand {
                    draw_hand_skeleton(&painter, rect, hand, &self.theme);
                }
            }
            if let Some(overlay) = &self.overlay {
                draw_overlay_wireframe(&painter, rect, overlay, &self.camera, self.theme.secondary);
            }
        });
    }

    fn render_settings_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_settings;
        let mut tracker = self.settings.tracker.clone();
        let mut scene = self.settings.scene.clone();

        egui::Window::new("Settings")
            .open(&mut open)
            .resizable(true)
            .default_size([400.0, 500.0])
            .show(ctx, |ui| {
                ui.heading("Tracking Settings");
                ui.add_space(10.0);

                ui.label("Rotation Smoothing (1 = snap):");
                ui.add(egui::Slider::new(&mut tracker.rotation_smoothing_factor, 0.0..=1.0).step_by(0.01));

                ui.label("Unproject Depth (NDC):");
                ui.add(egui::Slider::new(&mut tracker.unproject_depth, -1.0..=1.0).step_by(0.01));

                ui.label("Base Scale:");
                ui.add(egui::Slider::new(&mut tracker.base_scale, 0.0..=0.1).step_by(0.001));

                ui.label("Scale Multiplier:");
                ui.add(egui::Slider::new(&mut tracker.scale_multiplier, 0.0..=1.0).step_by(0.01));

                ui.separator();
                ui.heading("Scene Settings");

                ui.label("Field of View (degrees):");
                ui.add(egui::Slider::new(&mut scene.fov_degrees, 30.0..=120.0));

                ui.label("Camera Distance:");
                ui.add(egui::Slider::new(&mut scene.camera_distance, 1.0..=20.0));

                ui.separator();
                ui.heading("Output Settings");

                ui.label("Output Directory:");
                ui.label(self.settings.output_directory.display().to_string());
                if ui.button("Browse...").clicked() {
                    if let Some(dir) = rfd::FileDialog::new()
                        .set_directory(&self.settings.output_directory)
                        .pick_folder()
                    {
                        self.settings.output_directory = dir;
                    }
                }

                ui.add_space(10.0);
                if ui.button("💾 Save Settings").clicked() {
                    match self.settings.save() {
                        Ok(path) => self.status_message = Some(format!("Settings saved to {}", path.display())),
                        Err(e) => {
                            error!("Failed to save settings: {:#}", e);
                            self.status_message = Some(format!("Failed to save settings: {:#}", e));
                        }
                    }
                }
            });

        self.show_settings = open;
        self.apply_tracker_config(tracker);
        self.apply_scene_config(scene);
    }

    fn apply_tracker_config(&mut self, tracker: TrackerConfig) {
        if &tracker != self.pipeline.engine().config() {
            info!("Tracker settings changed: {:?}", tracker);
            self.pipeline.engine_mut().set_config(tracker.clone());
        }
        self.settings.tracker = tracker;
    }

    fn apply_scene_config(&mut self, scene: SceneConfig) {
        if scene != self.settings.scene {
            self.camera = PerspectiveCamera::new(&scene, self.camera.aspect);
            self.settings.scene = scene;
        }
    }

    fn pick_model(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Wavefront OBJ", &["obj"])
            .pick_file()
        else {
            return;
        };

        self.overlay = load_overlay(&path, &self.settings);
        if self.overlay.is_some() {
            self.settings.model_path = path;
            self.status_message = None;
        } else {
            self.status_message = Some(format!("Could not load {}", path.display()));
        }
    }

    fn finish_recording(&mut self) {
        let Some(recorder) = self.telemetry.recorder.take() else {
            return;
        };

        let exported = recorder
            .export_csv()
            .and_then(|csv| recorder.generate_report().map(|_| csv));
        match exported {
            Ok(csv) => self.status_message = Some(format!("Telemetry saved to {}", csv.display())),
            Err(e) => {
                error!("Failed to export telemetry: {:#}", e);
                self.status_message = Some(format!("Export failed: {:#}", e));
            }
        }
    }

    fn export_csv_as(&mut self) {
        let Some(recorder) = &self.telemetry.recorder else {
            return;
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV", &["csv"])
            .set_file_name("telemetry.csv")
            .save_file()
        else {
            return;
        };

        if let Err(e) = recorder.export_csv_to(&path) {
            error!("Failed to export telemetry: {:#}", e);
            self.status_message = Some(format!("Export failed: {:#}", e));
        }
    }
}

impl eframe::App for WristOverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.step(ctx);

        self.render_header(ctx);
        self.render_telemetry_panel(ctx);

        if self.show_settings {
            self.render_settings_window(ctx);
        }

        self.render_video(ctx);

        // Request repaint for continuous updates
        ctx.request_repaint();
    }
}

fn open_video_source(settings: &AppSettings) -> (VideoSource, Option<String>) {
    let synthetic = || VideoSource::new_synthetic(SYNTHETIC_SIZE.0, SYNTHETIC_SIZE.1, SYNTHETIC_FPS);

    if settings.simulate_camera {
        return (synthetic(), None);
    }

    match VideoSource::new_camera(settings.camera_index) {
        Ok(source) => (source, None),
        Err(e) => {
            error!("Camera unavailable, falling back to synthetic feed: {:#}", e);
            (synthetic(), Some(format!("Camera unavailable: {:#}", e)))
        }
    }
}

/// Loads the overlay mesh. Failure leaves the overlay absent until another
/// model is picked.
fn load_overlay(path: &Path, settings: &AppSettings) -> Option<Overlay> {
    match MeshAsset::load_obj(path) {
        Ok(mesh) => {
            info!(
                "Loaded overlay model {} ({} vertices, {} edges)",
                path.display(),
                mesh.vertices.len(),
                mesh.edges.len()
            );
            Some(Overlay::new(mesh, OverlayTransform::initial(&settings.tracker)))
        }
        Err(e) => {
            error!("Failed to load overlay model {}: {}", path.display(), e);
            None
        }
    }
}
