use std::sync::Arc;
use std::time::Duration;

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use faceprint_core::describe::describe;
use faceprint_core::{verify, Profile, VerificationResult};
use faceprint_store::DEFAULT_LIST_LIMIT;
use serde::Deserialize;

use super::read_files;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

fn profile_id(path: Result<Path<i64>, PathRejection>) -> ApiResult<i64> {
    path.map(|Path(id)| id)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// `POST /api/v1/profiles`: enroll the face in `file`.
///
/// This route sits outside the router's timeout layer. The deadline covers
/// the upload and the analysis only, so a timeout never lands after the
/// insert.
pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Profile>> {
    let secs = state.config.request_timeout_secs;
    let analysis = tokio::time::timeout(Duration::from_secs(secs), async {
        let [image] = read_files(multipart, ["file"]).await?;
        Ok::<_, ApiError>(state.engine.analyze(image).await?)
    })
    .await
    .map_err(|_| ApiError::Timeout(secs))??;
    let description = describe(&analysis);

    let profile = state
        .store
        .create(
            &description,
            &analysis.embedding.values,
            analysis.embedding.model_version.as_deref(),
        )
        .await?;
    tracing::info!(
        id = profile.id,
        dim = profile.embedding.len(),
        model = ?profile.model,
        "profile enrolled"
    );
    Ok(Json(profile))
}

/// `GET /api/v1/profiles/{id}`
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Profile>> {
    let id = profile_id(path)?;
    Ok(Json(state.store.get(id).await?))
}

/// `GET /api/v1/profiles?skip=&limit=`: profiles in creation order.
pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Profile>>> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let profiles = state
        .store
        .list(params.skip.unwrap_or(0), params.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(profiles))
}

/// `POST /api/v1/verify/{id}`: compare the face in `file` with a stored
/// profile.
///
/// The profile is looked up first, so an unknown id is a 404 whatever the
/// upload contains. A profile enrolled by another model is refused rather
/// than scored.
pub async fn verify_profile(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<VerificationResult>> {
    let id = profile_id(path)?;
    let profile = state.store.get(id).await?;

    let [image] = read_files(multipart, ["file"]).await?;
    let analysis = state.engine.analyze(image).await?;

    if let (Some(enrolled), Some(current)) = (&profile.model, &analysis.embedding.model_version) {
        if enrolled != current {
            return Err(ApiError::ModelMismatch {
                id,
                enrolled: enrolled.clone(),
                current: current.clone(),
            });
        }
    }

    let result = verify(
        &analysis.embedding.values,
        &profile.embedding,
        state.config.similarity_threshold,
    )?;
    tracing::info!(id, score = result.score, is_match = result.is_match, "verification");
    Ok(Json(result))
}
