// src/mediapipe_bridge.rs - Landmark detector seam plus a simulated landmarker
use std::f64::consts::PI;
use std::future::Future;

use anyhow::Result;
use nalgebra::Vector2;

use crate::landmarks::{HAND_LANDMARK_COUNT, LEFT_ELBOW, LEFT_WRIST, POSE_LANDMARK_COUNT};
use crate::video::VideoFrame;

/// Raw landmarks for one detected hand, as the landmarker reports them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandDetection {
    pub landmarks: Vec<[f64; 3]>,
    pub world_landmarks: Vec<[f64; 3]>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandLandmarkerResult {
    pub hands: Vec<HandDetection>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseLandmarkerResult {
    pub poses: Vec<Vec<[f64; 3]>>,
}

/// Hand landmark model. `frame.timestamp` is the video time the detection belongs to.
pub trait HandDetector {
    fn detect_hands(&self, frame: &VideoFrame) -> impl Future<Output = Result<HandLandmarkerResult>>;
}

/// Body pose landmark model.
pub trait PoseDetector {
    fn detect_pose(&self, frame: &VideoFrame) -> impl Future<Output = Result<PoseLandmarkerResult>>;
}

/// Produces a left forearm swinging and rolling in front of the camera, driven
/// by the frame timestamp. The hand drops out for a moment every `dropout_period`
/// seconds so the hold-last-transform path is visible.
#[derive(Debug, Clone)]
pub struct SimulatedLandmarker {
    pub dropout_period: f64,
    pub dropout_length: f64,
}

impl Default for SimulatedLandmarker {
    fn default() -> Self {
        Self {
            dropout_period: 10.0,
            dropout_length: 1.0,
        }
    }
}

struct ArmSample {
    elbow: Vector2<f64>,
    wrist: Vector2<f64>,
    roll: f64,
}

impl SimulatedLandmarker {
    fn arm_at(t: f64) -> ArmSample {
        let elbow = Vector2::new(0.45 + 0.03 * (t * 0.4).sin(), 0.85);
        let swing = -PI / 2.0 + 0.35 * (t * 0.7).sin();
        let wrist = elbow + Vector2::new(swing.cos(), swing.sin()) * 0.3;
        ArmSample {
            elbow,
            wrist,
            roll: 0.6 * (t * 0.5).sin(),
        }
    }

    fn hand_visible(&self, t: f64) -> bool {
        self.dropout_period <= 0.0 || t % self.dropout_period < self.dropout_period - self.dropout_length
    }

    fn hand_at(t: f64) -> HandDetection {
        let arm = Self::arm_at(t);
        let along = (arm.wrist - arm.elbow).normalize();
        let across = Vector2::new(-along.y, along.x);

        // Fingers thumb..little: lateral offset, length of each joint step
        const FINGERS: [(f64, f64); 5] = [
            (-0.045, 0.018),
            (-0.022, 0.024),
            (0.0, 0.026),
            (0.02, 0.024),
            (0.038, 0.018),
        ];

        let mut landmarks = Vec::with_capacity(HAND_LANDMARK_COUNT);
        let mut world_landmarks = Vec::with_capacity(HAND_LANDMARK_COUNT);

        let mut push = |offset: Vector2<f64>, depth: f64| {
            let rolled = across * offset.x * arm.roll.cos();
            let p = arm.wrist + along * offset.y + rolled;
            let z = offset.x * arm.roll.sin() + depth;
            landmarks.push([p.x, p.y, z]);
            // Metres, centred on the wrist
            let w = (p - arm.wrist) * 0.35;
            world_landmarks.push([w.x, w.y, z * 0.35]);
        };

        push(Vector2::zeros(), 0.0);
        for (lateral, step) in FINGERS {
            let base = if lateral < -0.04 { 0.02 } else { 0.07 };
            for joint in 0..4 {
                let offset = Vector2::new(lateral * (1.0 + 0.1 * joint as f64), base + step * joint as f64);
                push(offset, -0.005 * joint as f64);
            }
        }

        HandDetection {
            landmarks,
            world_landmarks,
        }
    }

    fn pose_at(t: f64) -> Vec<[f64; 3]> {
        let arm = Self::arm_at(t);
        let mut pose = vec![[0.5, 0.5, 0.0]; POSE_LANDMARK_COUNT];
        pose[LEFT_ELBOW] = [arm.elbow.x, arm.elbow.y, 0.0];
        pose[LEFT_WRIST] = [arm.wrist.x, arm.wrist.y, -0.02];
        pose
    }
}

impl HandDetector for SimulatedLandmarker {
    async fn detect_hands(&self, frame: &VideoFrame) -> Result<HandLandmarkerResult> {
        let t = frame.timestamp;
        let hands = if self.hand_visible(t) {
            vec![Self::hand_at(t)]
        } else {
            Vec::new()
        };
        Ok(HandLandmarkerResult { hands })
    }
}

impl PoseDetector for SimulatedLandmarker {
    async fn detect_pose(&self, frame: &VideoFrame) -> Result<PoseLandmarkerResult> {
        Ok(PoseLandmarkerResult {
            poses: vec![Self::pose_at(frame.timestamp)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{HandLandmarks, PoseLandmarks};
    use image::DynamicImage;

    fn frame(timestamp: f64) -> VideoFrame {
        VideoFrame {
            image: DynamicImage::new_rgb8(4, 4),
            timestamp,
        }
    }

    #[tokio::test]
    async fn simulated_sets_have_model_landmark_counts() {
        let sim = SimulatedLandmarker::default();
        let hands = sim.detect_hands(&frame(1.0)).await.unwrap();
        let poses = sim.detect_pose(&frame(1.0)).await.unwrap();

        let hand = &hands.hands[0];
        assert!(HandLandmarks::from_raw(hand.landmarks.clone(), hand.world_landmarks.clone()).is_ok());
        assert!(PoseLandmarks::from_raw(poses.poses[0].clone()).is_ok());
    }

    #[tokio::test]
    async fn simulated_hand_drops_out_periodically() {
        let sim = SimulatedLandmarker::default();
        assert_eq!(sim.detect_hands(&frame(3.0)).await.unwrap().hands.len(), 1);
        assert!(sim.detect_hands(&frame(9.5)).await.unwrap().hands.is_empty());
        assert_eq!(sim.detect_hands(&frame(10.2)).await.unwrap().hands.len(), 1);
    }

    #[test]
    fn simulated_wrist_stays_on_screen() {
        for i in 0..200 {
            let arm = SimulatedLandmarker::arm_at(i as f64 * 0.1);
            assert!((0.0..=1.0).contains(&arm.wrist.x));
            assert!((0.0..=1.0).contains(&arm.wrist.y));
        }
    }
}
