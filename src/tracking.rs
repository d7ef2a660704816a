// src/tracking.rs - Per-frame wrist measurement and overlay transform
use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::geometry::{
    calculate_distance, calculate_orientation, cross_product, is_finite, negate, normalize,
    orientation_from_basis, vector_between,
};
use crate::landmarks::{
    FrameLandmarks, HandLandmarks, PoseLandmarks, INDEX_MCP, MIDDLE_MCP, PINKY_MCP, PINKY_TIP,
    THUMB_CMC, THUMB_TIP, WRIST,
};
use crate::scene::Unproject;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub base_scale: f64,
    pub scale_multiplier: f64,
    /// Lower bound on the overlay scale.
    pub min_scale: f64,
    /// Slerp factor from the previous rotation towards the new one;
    /// 1.0 snaps to the new rotation every frame.
    pub rotation_smoothing_factor: f64,
    /// NDC depth used when unprojecting the wrist. Placeholder until real
    /// depth is estimated from the landmarks.
    pub unproject_depth: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_scale: 0.01,
            scale_multiplier: 0.1,
            min_scale: 0.001,
            rotation_smoothing_factor: 1.0,
            unproject_depth: 0.5,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum EngineError {
    #[error("overlay model is not loaded")]
    NoOverlay,
    #[error("no hand detected")]
    MissingHand,
    #[error("no pose detected")]
    MissingPose,
    #[error("degenerate landmark geometry in {0}")]
    DegenerateGeometry(&'static str),
}

/// Placement of the overlay model in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayTransform {
    pub position: Point3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub scale: f64,
}

impl OverlayTransform {
    /// Transform given to a freshly loaded model, before any wrist is seen.
    pub fn initial(config: &TrackerConfig) -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
            scale: config.base_scale.max(config.min_scale),
        }
    }
}

/// Readouts derived from one frame's hand landmarks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMeasurement {
    pub wrist_width: f64,
    pub orientation_radians: f64,
    pub orientation_degrees: f64,
    /// Unit vectors from the world landmarks; informational only.
    pub forward: Vector3<f64>,
    pub up: Vector3<f64>,
    pub right: Vector3<f64>,
    pub position: Point3<f64>,
}

/// Result of one engine step, handed to the render step and telemetry observers.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUpdate {
    pub timestamp: f64,
    /// `None` when no hand was detected, readouts then show zero.
    pub measurement: Option<FrameMeasurement>,
    /// `None` only while no overlay is loaded.
    pub transform: Option<OverlayTransform>,
    /// Why the transform was held instead of recomputed.
    pub skipped: Option<EngineError>,
}

impl FrameUpdate {
    pub fn applied(&self) -> bool {
        self.skipped.is_none()
    }
}

/// Turns landmark sets into overlay transforms. Holds configuration only;
/// the previous transform is passed in by the caller every frame.
#[derive(Debug, Clone, Default)]
pub struct OverlayEngine {
    config: TrackerConfig,
}

impl OverlayEngine {
    pub fn new(config: TrackerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: TrackerConfig) {
        self.config = config;
    }

    pub fn model_scale(&self, wrist_width: f64) -> f64 {
        let scale = self.config.base_scale + wrist_width * self.config.scale_multiplier;
        scale.max(self.config.min_scale)
    }

    pub fn measure(&self, hand: &HandLandmarks, camera: &impl Unproject) -> FrameMeasurement {
        let lm = &hand.landmarks;
        let world = &hand.world;

        let wrist_width = calculate_distance(&lm[THUMB_CMC], &lm[PINKY_MCP]);
        let orientation_radians = calculate_orientation(&lm[WRIST], &lm[MIDDLE_MCP]);

        FrameMeasurement {
            wrist_width,
            orientation_radians,
            orientation_degrees: orientation_radians.to_degrees(),
            forward: normalize(&vector_between(&world[WRIST], &world[MIDDLE_MCP])),
            up: normalize(&vector_between(&world[WRIST], &world[INDEX_MCP])),
            right: normalize(&vector_between(&world[WRIST], &world[PINKY_MCP])),
            position: self.wrist_position(hand, camera),
        }
    }

    /// Wrist screen position unprojected at the configured depth.
    fn wrist_position(&self, hand: &HandLandmarks, camera: &impl Unproject) -> Point3<f64> {
        let wrist = hand.wrist();
        let ndc = Point3::new(
            wrist.x * 2.0 - 1.0,
            -(wrist.y * 2.0) + 1.0,
            self.config.unproject_depth,
        );
        camera.unproject(&ndc)
    }

    /// Overlay rotation from the forearm (elbow to wrist) and the
    /// thumb-to-little-finger direction across the hand.
    pub fn target_rotation(&self, hand: &HandLandmarks, pose: &PoseLandmarks) -> UnitQuaternion<f64> {
        let forearm = normalize(&vector_between(pose.elbow(), pose.wrist()));
        let across = normalize(&vector_between(
            &hand.landmarks[THUMB_TIP],
            &hand.landmarks[PINKY_TIP],
        ));

        let up = forearm;
        let forward = negate(&across);
        let right = cross_product(&up, &forward);

        orientation_from_basis(&right, &up, &forward)
    }

    fn blend_rotation(
        &self,
        previous: &UnitQuaternion<f64>,
        target: UnitQuaternion<f64>,
    ) -> UnitQuaternion<f64> {
        let t = self.config.rotation_smoothing_factor.clamp(0.0, 1.0);
        if t >= 1.0 {
            return target;
        }
        if t <= 0.0 {
            return *previous;
        }
        // Opposite rotations have no unique path, jump straight to the target
        previous.try_slerp(&target, t, 1.0e-9).unwrap_or(target)
    }

    fn compute(
        &self,
        previous: &OverlayTransform,
        measurement: &FrameMeasurement,
        hand: &HandLandmarks,
        pose: &PoseLandmarks,
    ) -> Result<OverlayTransform, EngineError> {
        let target = self.target_rotation(hand, pose);
        if !target.coords.iter().all(|c| c.is_finite()) {
            return Err(EngineError::DegenerateGeometry("orientation"));
        }

        let scale = self.model_scale(measurement.wrist_width);
        if !scale.is_finite() {
            return Err(EngineError::DegenerateGeometry("scale"));
        }

        if !is_finite(&measurement.position.coords) {
            return Err(EngineError::DegenerateGeometry("position"));
        }

        Ok(OverlayTransform {
            position: measurement.position,
            rotation: self.blend_rotation(&previous.rotation, target),
            scale,
        })
    }

    /// Runs one frame.
    ///
    /// If the overlay, the hand or the pose is missing, or the landmarks are
    /// degenerate, the previous transform is returned untouched.
    pub fn update(
        &self,
        timestamp: f64,
        previous: Option<&OverlayTransform>,
        frame: &FrameLandmarks,
        camera: &impl Unproject,
    ) -> FrameUpdate {
        let measurement = frame.hand.as_ref().map(|hand| self.measure(hand, camera));

        let result = match (previous, frame.hand.as_ref().zip(measurement.as_ref()), &frame.pose) {
            (None, _, _) => Err(EngineError::NoOverlay),
            (Some(_), None, _) => Err(EngineError::MissingHand),
            (Some(_), Some(_), None) => Err(EngineError::MissingPose),
            (Some(prev), Some((hand, m)), Some(pose)) => self.compute(prev, m, hand, pose),
        };

        match result {
            Ok(transform) => {
                debug!(
                    "t={:.3} wrist_width={:.4} scale={:.4} pos=({:.3}, {:.3}, {:.3})",
                    timestamp,
                    measurement.map(|m| m.wrist_width).unwrap_or_default(),
                    transform.scale,
                    transform.position.x,
                    transform.position.y,
                    transform.position.z,
                );
                FrameUpdate {
                    timestamp,
                    measurement,
                    transform: Some(transform),
                    skipped: None,
                }
            }
            Err(reason) => {
                if let EngineError::DegenerateGeometry(_) = reason {
                    warn!("t={:.3} holding last overlay transform: {}", timestamp, reason);
                } else {
                    debug!("t={:.3} update skipped: {}", timestamp, reason);
                }
                FrameUpdate {
                    timestamp,
                    measurement,
                    transform: previous.copied(),
                    skipped: Some(reason),
                }
            }
        }
    }
}
