//! Embedding provider backed by SCRFD detection and ArcFace recognition.

use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::detector::{DetectorConfig, DetectorError, FaceDetector};
use crate::provider::{Capabilities, EmbeddingProvider, FaceAnalysis, ProviderError};
use crate::recognizer::{FaceRecognizer, RecognizerError, ARCFACE_EMBEDDING_DIM};
use crate::session::ExecutionPreference;

/// File names inside a model pack directory (insightface buffalo_l layout).
pub const DETECTOR_FILE: &str = "det_10g.onnx";
pub const RECOGNIZER_FILE: &str = "w600k_r50.onnx";

impl From<DetectorError> for ProviderError {
    fn from(e: DetectorError) -> Self {
        match e {
            DetectorError::ModelNotFound(p) => ProviderError::ModelNotFound(p),
            other => ProviderError::Inference(other.to_string()),
        }
    }
}

impl From<RecognizerError> for ProviderError {
    fn from(e: RecognizerError) -> Self {
        match e {
            RecognizerError::ModelNotFound(p) => ProviderError::ModelNotFound(p),
            other => ProviderError::Inference(other.to_string()),
        }
    }
}

/// Where to find a model pack and how to run it.
#[derive(Debug, Clone)]
pub struct OnnxModelSpec {
    pub name: String,
    pub dir: PathBuf,
    pub detector: DetectorConfig,
    pub execution: ExecutionPreference,
}

impl OnnxModelSpec {
    /// Model pack `name` under `model_root`, i.e. `<model_root>/<name>/`.
    pub fn in_root(model_root: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            dir: model_root.join(name),
            detector: DetectorConfig::default(),
            execution: ExecutionPreference::default(),
        }
    }

    pub fn detector_path(&self) -> PathBuf {
        self.dir.join(DETECTOR_FILE)
    }

    pub fn recognizer_path(&self) -> PathBuf {
        self.dir.join(RECOGNIZER_FILE)
    }
}

pub struct OnnxFaceProvider {
    name: String,
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceProvider {
    /// Load both models. Fails fast if either file is missing.
    pub fn load(spec: &OnnxModelSpec) -> Result<Self, ProviderError> {
        let detector = FaceDetector::load(&spec.detector_path(), spec.detector, spec.execution)?;
        let recognizer = FaceRecognizer::load(&spec.recognizer_path(), spec.execution)?;
        tracing::info!(
            model = %spec.name,
            dir = %spec.dir.display(),
            execution = ?spec.execution,
            "face model pack loaded"
        );
        Ok(Self {
            name: spec.name.clone(),
            detector,
            recognizer,
        })
    }
}

impl EmbeddingProvider for OnnxFaceProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            embedding_dim: ARCFACE_EMBEDDING_DIM,
            landmarks: true,
            confidence: true,
        }
    }

    fn detect_and_embed(&mut self, image: &RgbImage) -> Result<Option<FaceAnalysis>, ProviderError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(None);
        }

        let faces = self.detector.detect(image)?;
        let Some(face) = faces.first() else {
            tracing::debug!(model = %self.name, "no face detected");
            return Ok(None);
        };
        tracing::debug!(
            model = %self.name,
            faces = faces.len(),
            confidence = face.confidence,
            "faces detected"
        );

        let embedding = self.recognizer.extract(image, face)?;
        Ok(Some(FaceAnalysis {
            embedding,
            landmarks: face.landmarks,
            confidence: Some(face.confidence),
            face: Some(face.clone()),
            faces_detected: faces.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_spec_paths() {
        let spec = OnnxModelSpec::in_root(Path::new("/models"), "buffalo_l");
        assert_eq!(spec.detector_path(), PathBuf::from("/models/buffalo_l/det_10g.onnx"));
        assert_eq!(spec.recognizer_path(), PathBuf::from("/models/buffalo_l/w600k_r50.onnx"));
    }

    #[test]
    fn test_load_missing_models() {
        let spec = OnnxModelSpec::in_root(Path::new("/nonexistent/faceprint"), "buffalo_l");
        match OnnxFaceProvider::load(&spec) {
            Err(ProviderError::ModelNotFound(path)) => assert!(path.ends_with(DETECTOR_FILE)),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("loading from a missing directory must fail"),
        }
    }
}
