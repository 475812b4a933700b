//! Multi-model face profile: per-model embeddings plus their fused vector.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::provider::FaceAnalysis;
use crate::similarity::{self, SimilarityError};

/// Fused profile built from several providers' analyses of one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedProfile {
    pub embeddings: BTreeMap<String, Vec<f32>>,
    pub aggregated: Vec<f32>,
    /// `fingerprint(aggregated)`.
    pub hash: String,
    /// Landmarks from the first model (by name) that reported any.
    pub landmarks: Vec<[f32; 2]>,
    pub models_used: Vec<String>,
    /// Detection score per model; 1.0 when a model reports none.
    pub confidence_scores: BTreeMap<String, f32>,
}

impl AggregatedProfile {
    pub fn from_analyses(
        analyses: &BTreeMap<String, FaceAnalysis>,
        weights: Option<&HashMap<String, f32>>,
    ) -> Result<Self, SimilarityError> {
        let embeddings: BTreeMap<String, Vec<f32>> = analyses
            .iter()
            .map(|(name, a)| (name.clone(), a.embedding.values.clone()))
            .collect();

        let aggregated = similarity::aggregate(&embeddings, weights)?;
        let hash = similarity::fingerprint(&aggregated);

        let landmarks = analyses
            .values()
            .find_map(|a| a.landmarks)
            .map(|pts| pts.iter().map(|&(x, y)| [x, y]).collect())
            .unwrap_or_default();

        let confidence_scores = analyses
            .iter()
            .map(|(name, a)| (name.clone(), a.confidence.unwrap_or(1.0)))
            .collect();

        Ok(Self {
            models_used: embeddings.keys().cloned().collect(),
            embeddings,
            aggregated,
            hash,
            landmarks,
            confidence_scores,
        })
    }

    /// Per-model and fused similarities between two profiles.
    ///
    /// Keys are `"aggregated"` and `"model_<name>"` for each model both
    /// profiles share.
    pub fn similarities(&self, other: &Self) -> Result<BTreeMap<String, f32>, SimilarityError> {
        let mut out = BTreeMap::new();
        out.insert(
            "aggregated".to_string(),
            similarity::cosine_similarity(&self.aggregated, &other.aggregated)?,
        );
        for (model, emb) in &self.embeddings {
            if let Some(theirs) = other.embeddings.get(model) {
                out.insert(
                    format!("model_{model}"),
                    similarity::cosine_similarity(emb, theirs)?,
                );
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embedding;

    fn analysis(values: Vec<f32>, confidence: Option<f32>, landmarks: bool) -> FaceAnalysis {
        FaceAnalysis {
            embedding: Embedding::new(values),
            face: None,
            landmarks: landmarks.then_some([(1.0, 2.0), (3.0, 2.0), (2.0, 3.0), (1.5, 4.0), (2.5, 4.0)]),
            confidence,
            faces_detected: 1,
        }
    }

    #[test]
    fn test_single_model_profile() {
        let mut analyses = BTreeMap::new();
        analyses.insert("buffalo_l".to_string(), analysis(vec![0.6, 0.8], Some(0.93), true));

        let profile = AggregatedProfile::from_analyses(&analyses, None).unwrap();
        assert_eq!(profile.aggregated, vec![0.6, 0.8]);
        assert_eq!(profile.hash, similarity::fingerprint(&[0.6, 0.8]));
        assert_eq!(profile.models_used, vec!["buffalo_l".to_string()]);
        assert_eq!(profile.landmarks.len(), 5);
        assert_eq!(profile.landmarks[0], [1.0, 2.0]);
        assert_eq!(profile.confidence_scores["buffalo_l"], 0.93);
    }

    #[test]
    fn test_missing_confidence_defaults_to_one() {
        let mut analyses = BTreeMap::new();
        analyses.insert("a".to_string(), analysis(vec![1.0, 0.0], None, false));
        analyses.insert("b".to_string(), analysis(vec![0.0, 1.0], Some(0.5), true));

        let profile = AggregatedProfile::from_analyses(&analyses, None).unwrap();
        assert_eq!(profile.confidence_scores["a"], 1.0);
        assert_eq!(profile.confidence_scores["b"], 0.5);
        // "a" has no landmarks, so they come from "b"
        assert_eq!(profile.landmarks.len(), 5);
        assert_eq!(profile.aggregated, vec![0.5, 0.5]);
    }

    #[test]
    fn test_empty_analyses_rejected() {
        let err = AggregatedProfile::from_analyses(&BTreeMap::new(), None).unwrap_err();
        assert_eq!(err, SimilarityError::EmptyInput);
    }

    #[test]
    fn test_similarities_keys() {
        let mut left = BTreeMap::new();
        left.insert("a".to_string(), analysis(vec![1.0, 0.0], None, false));
        left.insert("b".to_string(), analysis(vec![1.0, 0.0], None, false));
        let mut right = BTreeMap::new();
        right.insert("a".to_string(), analysis(vec![1.0, 0.0], None, false));

        let l = AggregatedProfile::from_analyses(&left, None).unwrap();
        let r = AggregatedProfile::from_analyses(&right, None).unwrap();
        let sims = l.similarities(&r).unwrap();

        assert_eq!(sims.len(), 2);
        assert!((sims["aggregated"] - 1.0).abs() < 1e-6);
        assert!((sims["model_a"] - 1.0).abs() < 1e-6);
        assert!(!sims.contains_key("model_b"));
    }
}
