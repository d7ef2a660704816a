// src/video.rs - Camera feed with per-frame timestamps
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::{Buffer, CallbackCamera};
use tracing::{info, warn};

/// One captured image and the stream time it was captured at, in seconds.
/// Timestamps never decrease for a given source.
#[derive(Clone)]
pub struct VideoFrame {
    pub image: DynamicImage,
    pub timestamp: f64,
}

struct TimedBuffer {
    buffer: Buffer,
    timestamp: f64,
}

pub enum VideoSource {
    Camera {
        camera: CallbackCamera,
        latest: Arc<Mutex<Option<TimedBuffer>>>,
        cached: Option<VideoFrame>,
        info: VideoInfo,
    },
    /// Stand-in feed for machines without a usable camera.
    Synthetic {
        started: Instant,
        fps: f64,
        image: DynamicImage,
    },
}

#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub name: String,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl VideoSource {
    /// Opens the camera and starts streaming. Frames arrive on the camera
    /// thread; [`VideoSource::read_frame`] always returns the newest one.
    pub fn new_camera(index: u32) -> Result<Self> {
        info!("Opening camera index {}", index);

        let format = CameraFormat::new(Resolution::new(640, 480), FrameFormat::MJPEG, 30);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Exact(format));

        let latest: Arc<Mutex<Option<TimedBuffer>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&latest);
        let started = Instant::now();

        let mut camera = CallbackCamera::new(CameraIndex::Index(index), requested, move |buffer| {
            if let Ok(mut slot) = slot.lock() {
                *slot = Some(TimedBuffer {
                    buffer,
                    timestamp: started.elapsed().as_secs_f64(),
                });
            }
        })
        .with_context(|| format!("failed to open camera {}", index))?;

        camera
            .open_stream()
            .context("failed to start camera stream (is camera access allowed?)")?;

        info!("Camera stream open");
        Ok(VideoSource::Camera {
            camera,
            latest,
            cached: None,
            info: VideoInfo {
                name: format!("camera {}", index),
                fps: format.frame_rate() as f64,
                width: format.resolution().width(),
                height: format.resolution().height(),
            },
        })
    }

    pub fn new_synthetic(width: u32, height: u32, fps: f64) -> Self {
        let image: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
            let shade = 30 + ((x + y) % 64) as u8 / 4;
            Rgb([shade, shade, shade + 6])
        });
        VideoSource::Synthetic {
            started: Instant::now(),
            fps,
            image: DynamicImage::ImageRgb8(image),
        }
    }

    /// Newest available frame. Returns `Ok(None)` until the camera delivers its first image.
    pub fn read_frame(&mut self) -> Result<Option<VideoFrame>> {
        match self {
            VideoSource::Camera { latest, cached, .. } => {
                let fresh = latest
                    .lock()
                    .map_err(|_| anyhow::anyhow!("camera frame slot poisoned"))?
                    .take();

                if let Some(TimedBuffer { buffer, timestamp }) = fresh {
                    let decoded = buffer
                        .decode_image::<RgbFormat>()
                        .context("failed to decode camera frame")?;
                    // Mirror so the preview behaves like a mirror
                    let flipped = image::imageops::flip_horizontal(&decoded);
                    *cached = Some(VideoFrame {
                        image: DynamicImage::ImageRgb8(flipped),
                        timestamp,
                    });
                }
                Ok(cached.clone())
            }
            VideoSource::Synthetic { started, fps, image } => {
                // Quantise to the frame period so consecutive redraws can share a timestamp
                let elapsed = started.elapsed().as_secs_f64();
                let timestamp = (elapsed * *fps).floor() / *fps;
                Ok(Some(VideoFrame {
                    image: image.clone(),
                    timestamp,
                }))
            }
        }
    }

    pub fn is_camera(&self) -> bool {
        matches!(self, VideoSource::Camera { .. })
    }

    pub fn get_info(&self) -> VideoInfo {
        match self {
            VideoSource::Camera { info, .. } => info.clone(),
            VideoSource::Synthetic { fps, image, .. } => VideoInfo {
                name: "synthetic".to_string(),
                fps: *fps,
                width: image.width(),
                height: image.height(),
            },
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        if let VideoSource::Camera { camera, .. } = self {
            if let Err(e) = camera.stop_stream() {
                warn!("Failed to stop camera stream: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_timestamps_are_quantised_and_monotonic() {
        let mut source = VideoSource::new_synthetic(8, 6, 30.0);
        let mut last = -1.0;
        for _ in 0..5 {
            let frame = source.read_frame().unwrap().unwrap();
            assert!(frame.timestamp >= last);
            let ticks = frame.timestamp * 30.0;
            assert!((ticks - ticks.round()).abs() < 1e-6);
            last = frame.timestamp;
        }
    }

    #[test]
    fn synthetic_info_reports_image_size() {
        let source = VideoSource::new_synthetic(8, 6, 24.0);
        let info = source.get_info();
        assert_eq!((info.width, info.height), (8, 6));
        assert_eq!(info.fps, 24.0);
        assert!(!source.is_camera());
    }
}
