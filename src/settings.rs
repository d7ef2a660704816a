// src/settings.rs - Persisted application settings
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::scene::SceneConfig;
use crate::tracking::TrackerConfig;

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Use the synthetic feed and simulated landmarks instead of the camera.
    pub simulate_camera: bool,
    pub camera_index: u32,
    pub model_path: PathBuf,
    pub output_directory: PathBuf,
    pub tracker: TrackerConfig,
    pub scene: SceneConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            simulate_camera: false,
            camera_index: 0,
            model_path: PathBuf::from("assets/models/watch.obj"),
            output_directory: UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(|p| p.join("WristOverlay")))
                .unwrap_or_else(|| PathBuf::from("./output")),
            tracker: TrackerConfig::default(),
            scene: SceneConfig::default(),
        }
    }
}

impl AppSettings {
    /// Platform config location, e.g. `~/.config/wristoverlay/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "wristoverlay", "WristOverlay")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    /// Loads settings from the default location, or defaults if no file exists yet.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        let settings = serde_json::from_str(&text)
            .with_context(|| format!("invalid settings file {}", path.display()))?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::default_path().context("no config directory on this platform")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write settings to {}", path.display()))?;
        info!("Saved settings to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("wrist_overlay_{}_{}", name, std::process::id()))
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = scratch_dir("partial_settings");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(SETTINGS_FILE);
        std::fs::write(
            &path,
            r#"{ "camera_index": 2, "tracker": { "rotation_smoothing_factor": 0.25 } }"#,
        )
        .unwrap();

        let settings = AppSettings::load_from(&path).unwrap();
        assert_eq!(settings.camera_index, 2);
        assert_eq!(settings.tracker.rotation_smoothing_factor, 0.25);
        assert_eq!(settings.tracker.base_scale, 0.01);
        assert_eq!(settings.tracker.unproject_depth, 0.5);
        assert_eq!(settings.scene.fov_degrees, 75.0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = scratch_dir("saved_settings");
        let path = dir.join("nested").join(SETTINGS_FILE);
        let mut settings = AppSettings::default();
        settings.simulate_camera = true;
        settings.scene.camera_distance = 7.5;

        settings.save_to(&path).unwrap();
        let loaded = AppSettings::load_from(&path).unwrap();
        assert!(loaded.simulate_camera);
        assert_eq!(loaded.scene.camera_distance, 7.5);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = scratch_dir("bad_settings");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        let err = AppSettings::load_from(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid settings file"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
