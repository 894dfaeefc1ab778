use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use image::GrayImage;

/// Rectangular sub-area of an image believed to contain a face.
///
/// Coordinates are pixels in the decoded image's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Builds a region from raw detector output, clipping it to the image
    /// bounds. Returns `None` when the clipped region is empty.
    pub fn clipped(
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    ) -> Option<FaceRegion> {
        let x0 = i64::from(x).clamp(0, i64::from(image_width));
        let y0 = i64::from(y).clamp(0, i64::from(image_height));
        let x1 = (i64::from(x) + i64::from(width)).clamp(0, i64::from(image_width));
        let y1 = (i64::from(y) + i64::from(height)).clamp(0, i64::from(image_height));

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(FaceRegion {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

/// Pluggable face detection backend.
///
/// Pure with respect to the input image: the same image always yields the
/// same regions, in the same order.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, image: &GrayImage) -> Vec<FaceRegion>;
}

// Fixed detection parameters. Chosen once to roughly match the precision of
// a stock frontal-face Haar cascade; they are part of the localizer contract
// and are not configurable per request.
const MIN_FACE_SIZE: u32 = 20;
const SCORE_THRESH: f64 = 2.0;
const PYRAMID_SCALE_FACTOR: f32 = 0.8;
const SLIDE_WINDOW_STEP: u32 = 4;

/// Face localizer backed by the `rustface` crate (SeetaFace engine).
///
/// The model is parsed once at startup; each `detect` call builds a fresh
/// detector from it, so calls are safe from multiple request threads.
pub struct RustfaceLocalizer {
    model: rustface::Model,
}

impl RustfaceLocalizer {
    pub fn load(model_path: &Path) -> Result<Self> {
        let data = std::fs::read(model_path).with_context(|| {
            format!("failed to read face model from {}", model_path.display())
        })?;
        let model = rustface::read_model(Cursor::new(data))
            .map_err(|e| anyhow::anyhow!("failed to parse SeetaFace model: {e}"))?;
        Ok(Self { model })
    }
}

impl FaceDetector for RustfaceLocalizer {
    fn detect(&self, image: &GrayImage) -> Vec<FaceRegion> {
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(MIN_FACE_SIZE);
        detector.set_score_thresh(SCORE_THRESH);
        detector.set_pyramid_scale_factor(PYRAMID_SCALE_FACTOR);
        detector.set_slide_window_step(SLIDE_WINDOW_STEP, SLIDE_WINDOW_STEP);

        let (width, height) = image.dimensions();
        let faces = detector.detect(&rustface::ImageData::new(image.as_raw(), width, height));

        faces
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                FaceRegion::clipped(
                    bbox.x(),
                    bbox.y(),
                    bbox.width(),
                    bbox.height(),
                    width,
                    height,
                )
            })
            .collect()
    }
}
