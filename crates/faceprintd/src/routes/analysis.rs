use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::Json;
use faceprint_core::AggregatedProfile;
use serde::Serialize;

use super::read_files;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    /// `"aggregated"` plus `"model_<name>"` for each model both images share.
    pub similarities: BTreeMap<String, f32>,
    pub models_compared: Vec<String>,
    pub same_person_likely: bool,
}

async fn aggregate_image(state: &AppState, image: Vec<u8>) -> ApiResult<AggregatedProfile> {
    let analyses = state.engine.analyze_all(image).await?;
    let profile = AggregatedProfile::from_analyses(&analyses, state.config.model_weights.as_ref())?;
    tracing::debug!(models = ?profile.models_used, hash = %profile.hash, "image aggregated");
    Ok(profile)
}

/// `POST /api/v1/analyze`: run every loaded model on `file` and fuse the
/// embeddings.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<AggregatedProfile>> {
    let [image] = read_files(multipart, ["file"]).await?;
    Ok(Json(aggregate_image(&state, image).await?))
}

/// `POST /api/v1/compare`: similarity between the faces in `file1` and
/// `file2`.
pub async fn compare(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<CompareResponse>> {
    let [first, second] = read_files(multipart, ["file1", "file2"]).await?;
    let a = aggregate_image(&state, first).await?;
    let b = aggregate_image(&state, second).await?;

    let similarities = a.similarities(&b)?;
    let aggregated = similarities.get("aggregated").copied().unwrap_or_default();
    let models_compared = a
        .models_used
        .iter()
        .filter(|m| b.embeddings.contains_key(*m))
        .cloned()
        .collect();

    Ok(Json(CompareResponse {
        same_person_likely: aggregated > state.config.similarity_threshold,
        similarities,
        models_compared,
    }))
}
