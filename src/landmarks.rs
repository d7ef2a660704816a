// src/landmarks.rs - Landmark types and the fixed hand/pose index layout
use std::marker::PhantomData;

use nalgebra::Vector3;
use thiserror::Error;

/// Image-relative coordinates, 0..1 per axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Normalized;

/// Metric-ish coordinates relative to the detected subject.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct World;

/// A single tracked anatomical point.
///
/// The space marker keeps normalized and world landmarks from being combined
/// in one computation; every geometry helper takes both arguments in the same
/// space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark<S> {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    space: PhantomData<S>,
}

impl<S> Landmark<S> {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            space: PhantomData,
        }
    }

    pub fn coords(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

impl<S> From<[f64; 3]> for Landmark<S> {
    fn from(lm: [f64; 3]) -> Self {
        Self::new(lm[0], lm[1], lm[2])
    }
}

// Hand landmark indices, fixed by the hand model
pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const MIDDLE_MCP: usize = 9;
pub const PINKY_MCP: usize = 17;
pub const PINKY_TIP: usize = 20;

// Pose landmark indices
pub const LEFT_ELBOW: usize = 13;
pub const LEFT_WRIST: usize = 15;

pub const HAND_LANDMARK_COUNT: usize = 21;
pub const POSE_LANDMARK_COUNT: usize = 33;

/// Segments drawn for the hand skeleton in the preview.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1), (1, 2), (2, 3), (3, 4),
    (0, 5), (5, 6), (6, 7), (7, 8),
    (0, 9), (9, 10), (10, 11), (11, 12),
    (0, 13), (13, 14), (14, 15), (15, 16),
    (0, 17), (17, 18), (18, 19), (19, 20),
    (5, 9),
];

#[derive(Debug, Error, PartialEq)]
pub enum LandmarkError {
    #[error("expected {expected} {kind} landmarks, detector returned {actual}")]
    WrongCount {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}

fn to_array<S, const N: usize>(
    kind: &'static str,
    raw: Vec<[f64; 3]>,
) -> Result<[Landmark<S>; N], LandmarkError> {
    let actual = raw.len();
    let landmarks: Vec<Landmark<S>> = raw.into_iter().map(Landmark::from).collect();
    landmarks.try_into().map_err(|_| LandmarkError::WrongCount {
        kind,
        expected: N,
        actual,
    })
}

/// One detected hand: image-space landmarks plus the parallel world-space set.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    pub landmarks: [Landmark<Normalized>; HAND_LANDMARK_COUNT],
    pub world: [Landmark<World>; HAND_LANDMARK_COUNT],
}

impl HandLandmarks {
    pub fn from_raw(
        landmarks: Vec<[f64; 3]>,
        world: Vec<[f64; 3]>,
    ) -> Result<Self, LandmarkError> {
        Ok(Self {
            landmarks: to_array("hand", landmarks)?,
            world: to_array("hand world", world)?,
        })
    }

    pub fn wrist(&self) -> &Landmark<Normalized> {
        &self.landmarks[WRIST]
    }
}

/// One detected body pose.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseLandmarks {
    pub landmarks: [Landmark<Normalized>; POSE_LANDMARK_COUNT],
}

impl PoseLandmarks {
    pub fn from_raw(landmarks: Vec<[f64; 3]>) -> Result<Self, LandmarkError> {
        Ok(Self {
            landmarks: to_array("pose", landmarks)?,
        })
    }

    pub fn elbow(&self) -> &Landmark<Normalized> {
        &self.landmarks[LEFT_ELBOW]
    }

    pub fn wrist(&self) -> &Landmark<Normalized> {
        &self.landmarks[LEFT_WRIST]
    }
}

/// Everything the detectors produced for one video timestamp.
/// Only the first subject of each kind is ever tracked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameLandmarks {
    pub hand: Option<HandLandmarks>,
    pub pose: Option<PoseLandmarks>,
}
