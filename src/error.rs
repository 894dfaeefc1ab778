use thiserror::Error;

/// Failure modes of a single inference pipeline execution.
///
/// Every request terminates with either a prediction or exactly one of these
/// variants. There are no retries, no fallback face region, and no default
/// prediction.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The uploaded bytes do not decode to a valid image.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The localizer found zero face regions. Domain-level failure, not a
    /// runtime fault.
    #[error("No face detected")]
    NoFaceDetected,

    /// A face region lies outside the image bounds. Defensive: the localizer
    /// clips its output, so this should not occur on the normal path.
    #[error("face region ({x}, {y}) {width}x{height} exceeds image bounds {image_width}x{image_height}")]
    InvalidRegion {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    /// Tensor handed to the classifier does not match the model contract.
    #[error("expected input tensor of shape (1, 48, 48, 1), got {0:?}")]
    InvalidInputShape(Vec<usize>),

    /// The numeric runtime failed during the forward pass.
    #[error("inference failed: {0}")]
    Inference(#[from] ort::Error),

    /// The model emitted a score vector that does not cover the label set.
    #[error("model produced {0} class scores, expected 7")]
    MalformedOutput(usize),
}
