//! Embedding similarity, verification, and multi-model fusion.
//!
//! Every function here is pure: no I/O, no shared state.

use std::collections::{BTreeMap, HashMap};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::types::VerificationResult;

/// Default cosine similarity threshold for a positive match.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimilarityError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding is empty")]
    EmptyVector,
    #[error("embedding has zero norm")]
    ZeroNorm,
    #[error("similarity is not finite (embedding contains NaN or infinity)")]
    NonFinite,
    #[error("no embeddings to aggregate")]
    EmptyInput,
    #[error("total aggregation weight is zero")]
    ZeroWeight,
    #[error("weight for model {model:?} must be finite and non-negative")]
    InvalidWeight { model: String },
}

/// Cosine similarity between two equal-length, non-zero vectors.
///
/// Accumulates in f64 and clamps to [-1, 1] so that `u · u` reports exactly
/// 1.0 instead of drifting past it.
pub fn cosine_similarity(u: &[f32], v: &[f32]) -> Result<f32, SimilarityError> {
    if u.is_empty() || v.is_empty() {
        return Err(SimilarityError::EmptyVector);
    }
    if u.len() != v.len() {
        return Err(SimilarityError::DimensionMismatch {
            expected: u.len(),
            actual: v.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_u = 0.0f64;
    let mut norm_v = 0.0f64;
    for (&a, &b) in u.iter().zip(v.iter()) {
        let (a, b) = (f64::from(a), f64::from(b));
        dot += a * b;
        norm_u += a * a;
        norm_v += b * b;
    }

    if norm_u == 0.0 || norm_v == 0.0 {
        return Err(SimilarityError::ZeroNorm);
    }

    let score = dot / (norm_u.sqrt() * norm_v.sqrt());
    if !score.is_finite() {
        return Err(SimilarityError::NonFinite);
    }
    Ok(score.clamp(-1.0, 1.0) as f32)
}

/// Compare a candidate embedding against a reference with a static threshold.
///
/// `is_match` is `score >= threshold`; there is no smoothing or hysteresis.
pub fn verify(
    candidate: &[f32],
    reference: &[f32],
    threshold: f32,
) -> Result<VerificationResult, SimilarityError> {
    let score = cosine_similarity(candidate, reference)?;
    Ok(VerificationResult {
        is_match: score >= threshold,
        score,
    })
}

/// Fuse several models' embeddings of the same face into one vector.
///
/// With `weights == None` every model gets 1/N. Supplied weights are
/// renormalized over the models present; models missing from `weights`
/// count as zero. All embeddings must share one dimensionality.
pub fn aggregate(
    embeddings: &BTreeMap<String, Vec<f32>>,
    weights: Option<&HashMap<String, f32>>,
) -> Result<Vec<f32>, SimilarityError> {
    let mut iter = embeddings.values();
    let dim = match iter.next() {
        Some(first) => first.len(),
        None => return Err(SimilarityError::EmptyInput),
    };
    if let Some(bad) = iter.find(|e| e.len() != dim) {
        return Err(SimilarityError::DimensionMismatch {
            expected: dim,
            actual: bad.len(),
        });
    }

    let raw: Vec<(&String, f32)> = match weights {
        None => {
            let equal = 1.0 / embeddings.len() as f32;
            embeddings.keys().map(|name| (name, equal)).collect()
        }
        Some(weights) => {
            let mut raw = Vec::with_capacity(embeddings.len());
            for name in embeddings.keys() {
                let w = weights.get(name).copied().unwrap_or(0.0);
                if !w.is_finite() || w < 0.0 {
                    return Err(SimilarityError::InvalidWeight {
                        model: name.clone(),
                    });
                }
                raw.push((name, w));
            }
            raw
        }
    };

    let total: f32 = raw.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return Err(SimilarityError::ZeroWeight);
    }

    let mut fused: Option<Vec<f32>> = None;
    for (name, w) in raw {
        let weight = w / total;
        let emb = &embeddings[name];
        match fused.as_mut() {
            None => fused = Some(emb.iter().map(|x| weight * x).collect()),
            Some(acc) => {
                for (a, x) in acc.iter_mut().zip(emb.iter()) {
                    *a += weight * x;
                }
            }
        }
    }

    fused.ok_or(SimilarityError::EmptyInput)
}

/// Hex-encoded SHA-256 over the vector's little-endian f32 bytes.
///
/// For deduplication and integrity checks, not for security.
pub fn fingerprint(vector: &[f32]) -> String {
    let mut hasher = Sha256::new();
    for value in vector {
        hasher.update(value.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}
