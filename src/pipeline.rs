use std::sync::Arc;

use log::debug;

use crate::classifier::{EmotionModel, EmotionPrediction};
use crate::error::PipelineError;
use crate::localizer::FaceDetector;
use crate::preprocess;

/// One inference pipeline execution per request:
/// decode -> localize -> crop/resize/normalize -> classify.
///
/// Holds only read-only components injected at startup; there is no state
/// shared between executions, so one pipeline value serves every request
/// concurrently.
pub struct InferencePipeline {
    detector: Arc<dyn FaceDetector>,
    classifier: Arc<dyn EmotionModel>,
}

impl InferencePipeline {
    pub fn new(detector: Arc<dyn FaceDetector>, classifier: Arc<dyn EmotionModel>) -> Self {
        Self {
            detector,
            classifier,
        }
    }

    pub fn predict(&self, image_bytes: &[u8]) -> Result<EmotionPrediction, PipelineError> {
        let image = image::load_from_memory(image_bytes)?.to_luma8();

        let faces = self.detector.detect(&image);
        debug!("localizer found {} face region(s)", faces.len());

        // Largest area wins. Detector-internal candidate ordering is not
        // stable across backends, so picking "the first" would make results
        // depend on it.
        let region = faces
            .into_iter()
            .max_by_key(|region| region.area())
            .ok_or(PipelineError::NoFaceDetected)?;

        let input = preprocess::to_model_input(&image, &region)?;
        let probabilities = self.classifier.forward(input)?;

        Ok(EmotionPrediction::from_probabilities(probabilities))
    }
}
