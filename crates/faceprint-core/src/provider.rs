//! Embedding provider contract.
//!
//! A provider turns a decoded image into at most one face analysis. What a
//! provider can report (landmarks, detection confidence) is fixed when it
//! is constructed and advertised through [`Capabilities`].

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{BoundingBox, Embedding, Landmarks};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("provider initialization failed: {0}")]
    Init(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("provider {name} produced a {actual}-dim embedding, declared {declared}")]
    DimensionChanged {
        name: String,
        declared: usize,
        actual: usize,
    },
}

/// What a provider reports alongside the embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Length of every embedding the provider returns.
    pub embedding_dim: usize,
    pub landmarks: bool,
    pub confidence: bool,
}

/// Result of running a provider on an image with at least one face.
#[derive(Debug, Clone)]
pub struct FaceAnalysis {
    pub embedding: Embedding,
    /// Box of the face the embedding was computed from.
    pub face: Option<BoundingBox>,
    pub landmarks: Option<Landmarks>,
    pub confidence: Option<f32>,
    /// Number of faces the detector found in the image.
    pub faces_detected: usize,
}

/// A face detection + embedding model.
///
/// Implementations may hold inference sessions that need exclusive access,
/// hence `&mut self`. Callers share a provider by owning it on one thread.
pub trait EmbeddingProvider: Send {
    /// Model identifier, e.g. "buffalo_l".
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Detect the most prominent face and embed it. `Ok(None)` means no face.
    fn detect_and_embed(&mut self, image: &RgbImage) -> Result<Option<FaceAnalysis>, ProviderError>;
}

/// Run a provider and hold it to its declared capabilities.
///
/// Fields the provider did not declare are cleared, and an embedding of the
/// wrong length is an error rather than a silent mismatch downstream. An
/// embedding without a model version is tagged with the provider name.
pub fn run_checked(
    provider: &mut dyn EmbeddingProvider,
    image: &RgbImage,
) -> Result<Option<FaceAnalysis>, ProviderError> {
    let caps = provider.capabilities();
    let Some(mut analysis) = provider.detect_and_embed(image)? else {
        return Ok(None);
    };

    if analysis.embedding.dim() != caps.embedding_dim {
        return Err(ProviderError::DimensionChanged {
            name: provider.name().to_string(),
            declared: caps.embedding_dim,
            actual: analysis.embedding.dim(),
        });
    }
    if !caps.landmarks {
        analysis.landmarks = None;
        if let Some(face) = analysis.face.as_mut() {
            face.landmarks = None;
        }
    }
    if !caps.confidence {
        analysis.confidence = None;
    }
    if analysis.embedding.model_version.is_none() {
        analysis.embedding.model_version = Some(provider.name().to_string());
    }
    Ok(Some(analysis))
}
