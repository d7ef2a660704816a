// src/pipeline.rs - Detection dedupe and per-cycle engine step
use tracing::{debug, warn};

use crate::landmarks::{FrameLandmarks, HandLandmarks, PoseLandmarks};
use crate::mediapipe_bridge::{HandDetector, HandLandmarkerResult, PoseDetector, PoseLandmarkerResult};
use crate::scene::Unproject;
use crate::tracking::{FrameUpdate, OverlayEngine, OverlayTransform};
use crate::video::VideoFrame;

/// Receives every frame's outcome, whether or not the overlay moved.
pub trait TelemetryObserver {
    fn on_frame(&mut self, update: &FrameUpdate);
}

/// Runs detection at most once per video timestamp and the engine once per
/// redraw. Detections from the last new timestamp are reused until the video
/// advances.
pub struct FramePipeline<H, P> {
    hand_detector: H,
    pose_detector: P,
    engine: OverlayEngine,
    last_video_time: Option<f64>,
    detections: FrameLandmarks,
    detection_runs: u64,
}

impl<H: HandDetector, P: PoseDetector> FramePipeline<H, P> {
    pub fn new(hand_detector: H, pose_detector: P, engine: OverlayEngine) -> Self {
        Self {
            hand_detector,
            pose_detector,
            engine,
            last_video_time: None,
            detections: FrameLandmarks::default(),
            detection_runs: 0,
        }
    }

    pub fn engine(&self) -> &OverlayEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut OverlayEngine {
        &mut self.engine
    }

    /// Landmarks the current overlay transform was computed from.
    pub fn detections(&self) -> &FrameLandmarks {
        &self.detections
    }

    pub fn detection_runs(&self) -> u64 {
        self.detection_runs
    }

    /// One redraw cycle: refresh detections if the video moved on, then
    /// compute the overlay transform from whatever detections are current.
    pub async fn process(
        &mut self,
        frame: &VideoFrame,
        previous: Option<&OverlayTransform>,
        camera: &impl Unproject,
        observer: &mut dyn TelemetryObserver,
    ) -> FrameUpdate {
        if self.last_video_time != Some(frame.timestamp) {
            self.last_video_time = Some(frame.timestamp);

            let (hands, poses) = tokio::join!(
                self.hand_detector.detect_hands(frame),
                self.pose_detector.detect_pose(frame),
            );
            self.detections = FrameLandmarks {
                hand: first_hand(hands),
                pose: first_pose(poses),
            };
            self.detection_runs += 1;
        } else {
            debug!("t={:.3} video has not advanced, reusing detections", frame.timestamp);
        }

        let update = self
            .engine
            .update(frame.timestamp, previous, &self.detections, camera);
        observer.on_frame(&update);
        update
    }
}

fn first_hand(result: anyhow::Result<HandLandmarkerResult>) -> Option<HandLandmarks> {
    let detection = match result {
        Ok(result) => result.hands.into_iter().next()?,
        Err(e) => {
            warn!("Hand detection failed: {:#}", e);
            return None;
        }
    };

    match HandLandmarks::from_raw(detection.landmarks, detection.world_landmarks) {
        Ok(hand) => Some(hand),
        Err(e) => {
            warn!("Dropping hand detection: {}", e);
            None
        }
    }
}

fn first_pose(result: anyhow::Result<PoseLandmarkerResult>) -> Option<PoseLandmarks> {
    let landmarks = match result {
        Ok(result) => result.poses.into_iter().next()?,
        Err(e) => {
            warn!("Pose detection failed: {:#}", e);
            return None;
        }
    };

    match PoseLandmarks::from_raw(landmarks) {
        Ok(pose) => Some(pose),
        Err(e) => {
            warn!("Dropping pose detection: {}", e);
            None
        }
    }
}
