//! faceprint-core: face embedding similarity and providers.
//!
//! The similarity engine (cosine, verification, multi-model fusion,
//! fingerprints) is pure. Embeddings come from an [`EmbeddingProvider`];
//! with the `onnx` feature, SCRFD detection and ArcFace recognition run
//! via ONNX Runtime.

pub mod aggregated;
pub mod describe;
pub mod provider;
pub mod similarity;
pub mod types;

#[cfg(feature = "onnx")]
mod alignment;
#[cfg(feature = "onnx")]
pub mod detector;
#[cfg(feature = "onnx")]
pub mod onnx;
#[cfg(feature = "onnx")]
pub mod recognizer;
#[cfg(feature = "onnx")]
mod session;

pub use aggregated::AggregatedProfile;
pub use provider::{Capabilities, EmbeddingProvider, FaceAnalysis, ProviderError};
pub use similarity::{
    aggregate, cosine_similarity, fingerprint, verify, SimilarityError,
    DEFAULT_SIMILARITY_THRESHOLD,
};
pub use types::{BoundingBox, Embedding, Landmarks, Profile, VerificationResult};

#[cfg(feature = "onnx")]
pub use onnx::{OnnxFaceProvider, OnnxModelSpec};
#[cfg(feature = "onnx")]
pub use session::ExecutionPreference;
