use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array4;
use ort::{Session, Value};
use serde::Serialize;

use crate::error::PipelineError;

/// Label set the classifier was trained on (FER2013 ordering). Output index
/// `i` is the probability of `EMOTION_LABELS[i]`; this ordering belongs to
/// the model artifact and must never be edited independently of it.
pub const EMOTION_LABELS: [&str; 7] = [
    "Angry", "Disgust", "Fear", "Happy", "Sad", "Surprise", "Neutral",
];

/// Batch, height, width, channels.
pub const INPUT_SHAPE: [usize; 4] = [1, 48, 48, 1];

/// Result of one forward pass: the argmax label with its probability.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmotionPrediction {
    pub emotion: &'static str,
    pub confidence: f32,
    #[serde(skip)]
    pub probabilities: [f32; 7],
}

impl EmotionPrediction {
    pub fn from_probabilities(probabilities: [f32; 7]) -> Self {
        let mut top = 0;
        for i in 1..probabilities.len() {
            if probabilities[i] > probabilities[top] {
                top = i;
            }
        }
        Self {
            emotion: EMOTION_LABELS[top],
            confidence: probabilities[top],
            probabilities,
        }
    }
}

/// Forward pass over one normalized face tensor.
pub trait EmotionModel: Send + Sync {
    fn forward(&self, input: Array4<f32>) -> Result<[f32; 7], PipelineError>;
}

/// Emotion classifier backed by an ONNX model.
///
/// The session is created once at startup and held read-only for the process
/// lifetime; `Session::run` takes `&self` and ONNX Runtime inference over a
/// read-only session is thread safe, so concurrent requests share it without
/// locking.
pub struct OnnxEmotionClassifier {
    session: Session,
    input_name: String,
}

impl OnnxEmotionClassifier {
    pub fn load(model_path: &Path) -> Result<Self> {
        let session = Session::builder()?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("failed to load emotion model from {}", model_path.display())
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("emotion model declares no inputs")?;

        Ok(Self {
            session,
            input_name,
        })
    }
}

impl EmotionModel for OnnxEmotionClassifier {
    fn forward(&self, input: Array4<f32>) -> Result<[f32; 7], PipelineError> {
        if input.shape() != INPUT_SHAPE {
            return Err(PipelineError::InvalidInputShape(input.shape().to_vec()));
        }

        let input_value = Value::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_value]?)?;

        let output_tensor = outputs[0].try_extract_tensor::<f32>()?;
        let scores: Vec<f32> = output_tensor.view().iter().copied().collect();
        let probabilities: [f32; 7] = scores
            .as_slice()
            .try_into()
            .map_err(|_| PipelineError::MalformedOutput(scores.len()))?;

        Ok(probabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_picks_argmax_label() {
        let prediction =
            EmotionPrediction::from_probabilities([0.05, 0.05, 0.1, 0.6, 0.1, 0.05, 0.05]);
        assert_eq!(prediction.emotion, "Happy");
        assert!((prediction.confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn prediction_breaks_ties_towards_first_label() {
        let prediction =
            EmotionPrediction::from_probabilities([0.3, 0.3, 0.1, 0.1, 0.1, 0.05, 0.05]);
        assert_eq!(prediction.emotion, "Angry");
    }

    #[test]
    fn prediction_serializes_label_and_confidence_only() {
        let prediction =
            EmotionPrediction::from_probabilities([0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        let json = serde_json::to_value(&prediction).unwrap();
        assert_eq!(json["emotion"], "Neutral");
        assert_eq!(json["confidence"], 1.0);
        assert!(json.get("probabilities").is_none());
    }
}
