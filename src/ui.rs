// src/ui.rs - Painter helpers for the video view, overlay wireframe and telemetry
use eframe::egui::{self, Color32, Pos2, Rect, Stroke, Vec2};
use egui_extras::{Column, TableBuilder};
use image::DynamicImage;
use nalgebra::Point3;

use crate::landmarks::{HandLandmarks, HAND_CONNECTIONS};
use crate::scene::{Overlay, PerspectiveCamera};
use crate::tracking::FrameUpdate;

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color32,
    pub secondary: Color32,
    pub surface: Color32,
    pub error: Color32,
    pub warning: Color32,
    pub success: Color32,
    pub text_primary: Color32,
    pub text_secondary: Color32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color32::from_rgb(70, 130, 240),
            secondary: Color32::from_rgb(255, 152, 0),
            surface: Color32::from_rgb(30, 30, 35),
            error: Color32::from_rgb(244, 67, 54),
            warning: Color32::from_rgb(255, 152, 0),
            success: Color32::from_rgb(76, 175, 80),
            text_primary: Color32::WHITE,
            text_secondary: Color32::from_rgb(200, 200, 200),
        }
    }
}

/// Maps normalized device coordinates onto a screen rect. NDC y points up,
/// screen y points down.
pub fn ndc_to_screen(rect: Rect, ndc: &Point3<f64>) -> Pos2 {
    Pos2::new(
        rect.left() + ((ndc.x as f32 + 1.0) / 2.0) * rect.width(),
        rect.top() + ((1.0 - ndc.y as f32) / 2.0) * rect.height(),
    )
}

fn normalized_to_screen(rect: Rect, x: f64, y: f64) -> Pos2 {
    Pos2::new(
        rect.left() + x as f32 * rect.width(),
        rect.top() + y as f32 * rect.height(),
    )
}

/// Draws the overlay mesh as a wireframe. Edges with an endpoint outside the
/// clip volume are skipped.
pub fn draw_overlay_wireframe(
    painter: &egui::Painter,
    rect: Rect,
    overlay: &Overlay,
    camera: &PerspectiveCamera,
    color: Color32,
) {
    let projected: Vec<Option<Pos2>> = overlay
        .world_vertices()
        .map(|v| {
            let ndc = camera.project(&v);
            let visible = ndc.coords.iter().all(|c| c.is_finite()) && (-1.0..=1.0).contains(&ndc.z);
            visible.then(|| ndc_to_screen(rect, &ndc))
        })
        .collect();

    let stroke = Stroke::new(1.5, color);
    for &(a, b) in &overlay.mesh.edges {
        if let (Some(Some(from)), Some(Some(to))) = (projected.get(a), projected.get(b)) {
            painter.line_segment([*from, *to], stroke);
        }
    }
}

pub fn draw_hand_skeleton(painter: &egui::Painter, rect: Rect, hand: &HandLandmarks, theme: &Theme) {
    let points: Vec<Pos2> = hand
        .landmarks
        .iter()
        .map(|lm| normalized_to_screen(rect, lm.x, lm.y))
        .collect();

    for (from, to) in HAND_CONNECTIONS {
        painter.line_segment([points[from], points[to]], Stroke::new(2.0, theme.primary));
    }

    for (i, pos) in points.iter().enumerate() {
        let color = if i == 0 { theme.secondary } else { theme.primary };
        painter.circle_filled(*pos, 3.5, color);
    }
}

/// Dial showing the in-plane hand orientation, 0 degrees pointing right.
pub fn draw_orientation_dial(ui: &mut egui::Ui, degrees: Option<f64>, theme: &Theme) {
    let size = Vec2::splat(120.0);
    let (rect, _response) = ui.allocate_exact_size(size, egui::Sense::hover());
    let center = rect.center();
    let radius = rect.width().min(rect.height()) * 0.45;

    let painter = ui.painter();
    painter.circle_filled(center, radius, theme.surface);
    draw_arc(
        painter,
        center,
        radius * 0.9,
        0.0,
        std::f32::consts::TAU,
        theme.text_secondary.gamma_multiply(0.3),
        2.0,
    );

    let Some(degrees) = degrees else {
        painter.text(
            center,
            egui::Align2::CENTER_CENTER,
            "--",
            egui::FontId::proportional(18.0),
            theme.text_secondary,
        );
        return;
    };

    // Screen y grows downwards, so the needle follows the image convention directly
    let angle = degrees.to_radians() as f32;
    draw_arc(painter, center, radius * 0.9, 0.0, angle, theme.secondary, 4.0);
    let tip = center + Vec2::angled(angle) * radius * 0.8;
    painter.line_segment([center, tip], Stroke::new(3.0, theme.secondary));
    painter.text(
        Pos2::new(center.x, center.y + radius * 0.5),
        egui::Align2::CENTER_CENTER,
        format!("{:.1}°", degrees),
        egui::FontId::proportional(14.0),
        theme.text_primary,
    );
}

/// Status line shown above the telemetry table.
pub fn draw_tracking_status(ui: &mut egui::Ui, update: Option<&FrameUpdate>, theme: &Theme) {
    let (text, color) = match update {
        None => ("Waiting for video".to_string(), theme.text_secondary),
        Some(update) => match update.skipped {
            None => ("Tracking".to_string(), theme.success),
            Some(reason) => (format!("Holding: {}", reason), theme.warning),
        },
    };
    ui.colored_label(color, egui::RichText::new(text).size(16.0));
}

/// Per-frame readouts. Values read zero while no hand is detected.
pub fn telemetry_table(ui: &mut egui::Ui, update: Option<&FrameUpdate>) {
    let measurement = update.and_then(|u| u.measurement);
    let transform = update.and_then(|u| u.transform);

    let fmt_vec = |v: Option<nalgebra::Vector3<f64>>| {
        let v = v.unwrap_or_else(nalgebra::Vector3::zeros);
        format!("({:+.3}, {:+.3}, {:+.3})", v.x, v.y, v.z)
    };

    let rows: Vec<(&str, String)> = vec![
        (
            "Timestamp",
            format!("{:.3} s", update.map(|u| u.timestamp).unwrap_or_default()),
        ),
        (
            "Wrist width",
            format!("{:.4}", measurement.map(|m| m.wrist_width).unwrap_or_default()),
        ),
        (
            "Orientation",
            format!(
                "{:.1}°",
                measurement.map(|m| m.orientation_degrees).unwrap_or_default()
            ),
        ),
        ("Forward", fmt_vec(measurement.map(|m| m.forward))),
        ("Up", fmt_vec(measurement.map(|m| m.up))),
        ("Right", fmt_vec(measurement.map(|m| m.right))),
        ("Position", fmt_vec(transform.map(|t| t.position.coords))),
        (
            "Scale",
            format!("{:.4}", transform.map(|t| t.scale).unwrap_or_default()),
        ),
        (
            "Rotation",
            transform
                .map(|t| {
                    let (roll, pitch, yaw) = t.rotation.euler_angles();
                    format!(
                        "r {:.0}° p {:.0}° y {:.0}°",
                        roll.to_degrees(),
                        pitch.to_degrees(),
                        yaw.to_degrees()
                    )
                })
                .unwrap_or_else(|| "-".to_string()),
        ),
    ];

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto().at_least(90.0))
        .column(Column::remainder())
        .body(|mut body| {
            for (label, value) in rows {
                body.row(20.0, |mut row| {
                    row.col(|ui| {
                        ui.strong(label);
                    });
                    row.col(|ui| {
                        ui.monospace(value);
                    });
                });
            }
        });
}

fn draw_arc(
    painter: &egui::Painter,
    center: Pos2,
    radius: f32,
    start_angle: f32,
    end_angle: f32,
    color: Color32,
    thickness: f32,
) {
    let points_count = ((end_angle - start_angle).abs() * 50.0) as usize;
    if points_count == 0 {
        return;
    }
    let mut points = Vec::with_capacity(points_count + 1);

    for i in 0..=points_count {
        let t = i as f32 / points_count as f32;
        let angle = start_angle + (end_angle - start_angle) * t;
        let x = center.x + radius * angle.cos();
        let y = center.y + radius * angle.sin();
        points.push(Pos2::new(x, y));
    }

    for i in 1..points.len() {
        painter.line_segment(
            [points[i - 1], points[i]],
            Stroke::new(thickness, color),
        );
    }
}

// Custom widget for video display
pub struct VideoWidget {
    texture: Option<egui::TextureHandle>,
    aspect_ratio: f32,
}

impl VideoWidget {
    pub fn new() -> Self {
        Self {
            texture: None,
            aspect_ratio: 4.0 / 3.0,
        }
    }

    pub fn update_frame(&mut self, ctx: &egui::Context, frame: &DynamicImage) {
        let size = [frame.width() as _, frame.height() as _];
        let rgba = frame.to_rgba8();
        let pixels = rgba.as_flat_samples();

        let color_image = egui::ColorImage::from_rgba_unmultiplied(
            size,
            pixels.as_slice(),
        );

        if frame.height() > 0 {
            self.aspect_ratio = frame.width() as f32 / frame.height() as f32;
        }

        match &mut self.texture {
            Some(texture) => texture.set(color_image, Default::default()),
            None => {
                self.texture = Some(ctx.load_texture(
                    "video_frame",
                    color_image,
                    Default::default(),
                ));
            }
        }
    }

    /// Paints the latest frame letterboxed into the available space and
    /// returns the rect it occupies so overlays can be drawn on top.
    pub fn show(&self, ui: &mut egui::Ui) -> Rect {
        let available_size = ui.available_size();
        let mut size = Vec2::new(available_size.x, available_size.x / self.aspect_ratio);
        if size.y > available_size.y {
            size = Vec2::new(available_size.y * self.aspect_ratio, available_size.y);
        }
        let (rect, _response) = ui.allocate_exact_size(size, egui::Sense::hover());

        if let Some(texture) = &self.texture {
            ui.painter().image(
                texture.id(),
                rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        } else {
            ui.painter().rect_filled(
                rect,
                egui::Rounding::same(4.0),
                Color32::from_rgb(50, 50, 55),
            );
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "No Video Signal",
                egui::FontId::proportional(16.0),
                Color32::from_rgb(150, 150, 155),
            );
        }
        rect
    }
}
