// src/data.rs
use crate::pipeline::TelemetryObserver;
use crate::tracking::{EngineError, FrameUpdate};
use csv::Writer;
use std::path::{Path, PathBuf};
use std::fs::File;
use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
struct TelemetryRecord {
    timestamp: f64,
    frame: usize,
    applied: bool,
    skip_reason: Option<String>,

    // Readouts
    wrist_width: Option<f64>,
    orientation_radians: Option<f64>,
    orientation_degrees: Option<f64>,

    forward_x: Option<f64>,
    forward_y: Option<f64>,
    forward_z: Option<f64>,

    up_x: Option<f64>,
    up_y: Option<f64>,
    up_z: Option<f64>,

    right_x: Option<f64>,
    right_y: Option<f64>,
    right_z: Option<f64>,

    // Overlay transform
    position_x: Option<f64>,
    position_y: Option<f64>,
    position_z: Option<f64>,
    rotation_w: Option<f64>,
    rotation_i: Option<f64>,
    rotation_j: Option<f64>,
    rotation_k: Option<f64>,
    scale: Option<f64>,
}

impl TelemetryRecord {
    fn from_update(frame: usize, update: &FrameUpdate) -> Self {
        let m = update.measurement.as_ref();
        let t = update.transform.as_ref();
        let q = t.map(|t| t.rotation.quaternion());

        Self {
            timestamp: update.timestamp,
            frame,
            applied: update.applied(),
            skip_reason: update.skipped.map(|reason| reason.to_string()),
            wrist_width: m.map(|m| m.wrist_width),
            orientation_radians: m.map(|m| m.orientation_radians),
            orientation_degrees: m.map(|m| m.orientation_degrees),
            forward_x: m.map(|m| m.forward.x),
            forward_y: m.map(|m| m.forward.y),
            forward_z: m.map(|m| m.forward.z),
            up_x: m.map(|m| m.up.x),
            up_y: m.map(|m| m.up.y),
            up_z: m.map(|m| m.up.z),
            right_x: m.map(|m| m.right.x),
            right_y: m.map(|m| m.right.y),
            right_z: m.map(|m| m.right.z),
            position_x: t.map(|t| t.position.x),
            position_y: t.map(|t| t.position.y),
            position_z: t.map(|t| t.position.z),
            rotation_w: q.map(|q| q.w),
            rotation_i: q.map(|q| q.i),
            rotation_j: q.map(|q| q.j),
            rotation_k: q.map(|q| q.k),
            scale: t.map(|t| t.scale),
        }
    }
}

/// Frame counts for one recorded session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionSummary {
    pub total_frames: usize,
    pub applied: usize,
    pub missing_hand: usize,
    pub missing_pose: usize,
    pub degenerate: usize,
}

impl SessionSummary {
    pub fn applied_rate(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.applied as f64 / self.total_frames as f64
    }
}

pub struct TelemetryExporter {
    output_dir: PathBuf,
    session_name: String,
    updates: Vec<FrameUpdate>,
}

impl TelemetryExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            updates: Vec::new(),
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn frame_count(&self) -> usize {
        self.updates.len()
    }

    pub fn add_frame(&mut self, update: &FrameUpdate) {
        self.updates.push(update.clone());
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    /// Writes `telemetry.csv` into the session folder.
    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.session_dir().join("telemetry.csv");
        self.export_csv_to(&csv_path)?;
        Ok(csv_path)
    }

    pub fn export_csv_to(&self, csv_path: &Path) -> Result<()> {
        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(csv_path)
            .with_context(|| format!("failed to create {}", csv_path.display()))?;
        let mut writer = Writer::from_writer(file);

        for (i, update) in self.updates.iter().enumerate() {
            writer.serialize(TelemetryRecord::from_update(i, update))?;
        }

        writer.flush()?;
        info!("Exported {} frames to {}", self.updates.len(), csv_path.display());
        Ok(())
    }

    pub fn summary(&self) -> SessionSummary {
        let mut summary = SessionSummary {
            total_frames: self.updates.len(),
            ..SessionSummary::default()
        };
        for update in &self.updates {
            match update.skipped {
                None => summary.applied += 1,
                Some(EngineError::MissingHand) => summary.missing_hand += 1,
                Some(EngineError::MissingPose) => summary.missing_pose += 1,
                Some(EngineError::DegenerateGeometry(_)) => summary.degenerate += 1,
                Some(EngineError::NoOverlay) => {}
            }
        }
        summary
    }

    pub fn generate_report(&self) -> Result<PathBuf> {
        let report_path = self.session_dir().join("report.html");

        if let Some(parent) = report_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&report_path, self.create_html_report())?;
        Ok(report_path)
    }

    fn create_html_report(&self) -> String {
        let summary = self.summary();

        format!(r#"
<!DOCTYPE html>
<html>
<head>
    <title>Wrist Overlay Report - {}</title>
    <style>
        body {{ font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 40px; background: #f5f5f5; }}
        h1 {{ color: #333; }}
        .stats {{ background: white; padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        .stat-item {{ margin: 10px 0; }}
        .stat-label {{ font-weight: bold; color: #666; }}
        .stat-value {{ color: #4682EA; font-size: 1.2em; }}
    </style>
</head>
<body>
    <h1>Wrist Overlay Session Report</h1>
    <div class="stats">
        <h2>Session: {}</h2>
        <div class="stat-item">
            <span class="stat-label">Total Frames:</span>
            <span class="stat-value">{}</span>
        </div>
        <div class="stat-item">
            <span class="stat-label">Overlay Tracked:</span>
            <span class="stat-value">{:.1}%</span>
        </div>
        <div class="stat-item">
            <span class="stat-label">Hand Missing:</span>
            <span class="stat-value">{} frames</span>
        </div>
        <div class="stat-item">
            <span class="stat-label">Pose Missing:</span>
            <span class="stat-value">{} frames</span>
        </div>
        <div class="stat-item">
            <span class="stat-label">Degenerate Geometry:</span>
            <span class="stat-value">{} frames</span>
        </div>
    </div>
</body>
</html>
        "#,
            self.session_name,
            self.session_name,
            summary.total_frames,
            summary.applied_rate() * 100.0,
            summary.missing_hand,
            summary.missing_pose,
            summary.degenerate,
        )
    }
}

impl TelemetryObserver for TelemetryExporter {
    fn on_frame(&mut self, update: &FrameUpdate) {
        self.add_frame(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{FrameMeasurement, OverlayTransform, TrackerConfig};
    use nalgebra::{Point3, Vector3};

    fn applied(timestamp: f64) -> FrameUpdate {
        FrameUpdate {
            timestamp,
            measurement: Some(FrameMeasurement {
                wrist_width: 0.2,
                orientation_radians: 0.5,
                orientation_degrees: 0.5f64.to_degrees(),
                forward: Vector3::z(),
                up: Vector3::y(),
                right: Vector3::x(),
                position: Point3::new(0.1, 0.2, 0.3),
            }),
            transform: Some(OverlayTransform::initial(&TrackerConfig::default())),
            skipped: None,
        }
    }

    fn held(timestamp: f64, reason: EngineError) -> FrameUpdate {
        FrameUpdate {
            timestamp,
            measurement: None,
            transform: Some(OverlayTransform::initial(&TrackerConfig::default())),
            skipped: Some(reason),
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("wrist_overlay_{}_{}", name, std::process::id()))
    }

    #[test]
    fn csv_has_one_row_per_frame() {
        let dir = scratch_dir("telemetry_csv");
        let mut exporter = TelemetryExporter::new(&dir, Some("test".to_string()));
        exporter.on_frame(&applied(0.0));
        exporter.on_frame(&held(0.033, EngineError::MissingHand));

        let path = exporter.export_csv().unwrap();
        assert_eq!(path, dir.join("test").join("telemetry.csv"));

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "timestamp");
        assert!(headers.iter().any(|h| h == "rotation_w"));

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][2], "true");
        assert_eq!(&rows[0][4], "0.2");
        assert_eq!(&rows[1][2], "false");
        assert_eq!(&rows[1][3], "no hand detected");
        // Readouts are blank when no hand was seen
        assert_eq!(&rows[1][4], "");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn summary_counts_skip_reasons() {
        let mut exporter = TelemetryExporter::new(scratch_dir("unused"), None);
        exporter.add_frame(&applied(0.0));
        exporter.add_frame(&applied(0.1));
        exporter.add_frame(&held(0.2, EngineError::MissingPose));
        exporter.add_frame(&held(0.3, EngineError::DegenerateGeometry("orientation")));

        let summary = exporter.summary();
        assert_eq!(summary.total_frames, 4);
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.missing_pose, 1);
        assert_eq!(summary.degenerate, 1);
        assert!((summary.applied_rate() - 0.5).abs() < 1e-12);
        assert!(exporter.session_name().starts_with("session_"));
    }

    #[test]
    fn empty_session_reports_zero_rate() {
        let exporter = TelemetryExporter::new(scratch_dir("empty"), None);
        assert_eq!(exporter.summary().applied_rate(), 0.0);
        assert!(exporter.create_html_report().contains("0.0%"));
    }
}
