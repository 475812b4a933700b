use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::error::ApiResult;
use crate::state::AppState;

/// Liveness plus a summary of what is loaded.
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let models = state.engine.status().await?;
    let profiles = state.store.count().await?;

    Ok(Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "models_available": models.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
        "profiles": profiles,
    })))
}

/// `GET /api/v1/models`
pub async fn models(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let models = state.engine.status().await?;

    Ok(Json(json!({
        "loaded_models": models.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
        // first loaded model embeds profiles
        "primary_model": models.first().map(|m| m.name.as_str()),
        "total_loaded": models.len(),
        "attempted_models": state.config.models,
        "capabilities": models
            .iter()
            .map(|m| (m.name.clone(), m.capabilities))
            .collect::<std::collections::BTreeMap<_, _>>(),
    })))
}
