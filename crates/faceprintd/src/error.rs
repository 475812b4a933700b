use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use faceprint_core::SimilarityError;
use faceprint_store::StoreError;
use serde_json::json;

use crate::engine::EngineError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced by the REST API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("no face detected in image")]
    NoFaceDetected,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("profile {0} not found")]
    ProfileNotFound(i64),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Similarity(#[from] SimilarityError),

    #[error("profile {id} was enrolled with model {enrolled}, this image was embedded with {current}")]
    ModelMismatch {
        id: i64,
        enrolled: String,
        current: String,
    },

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidImage(_) | ApiError::NoFaceDetected | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::ProfileNotFound(_) | ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Similarity(_) | ApiError::ModelMismatch { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::InvalidImage(_) => "INVALID_IMAGE",
            ApiError::NoFaceDetected => "NO_FACE_DETECTED",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ProfileNotFound(_) => "PROFILE_NOT_FOUND",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::Similarity(e) => match e {
                SimilarityError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
                SimilarityError::ZeroNorm
                | SimilarityError::EmptyVector
                | SimilarityError::NonFinite => "DEGENERATE_EMBEDDING",
                SimilarityError::EmptyInput
                | SimilarityError::ZeroWeight
                | SimilarityError::InvalidWeight { .. } => "AGGREGATION_ERROR",
            },
            ApiError::ModelMismatch { .. } => "MODEL_MISMATCH",
            ApiError::Timeout(_) => "REQUEST_TIMEOUT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "request rejected");
        }

        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidImage(msg) => ApiError::InvalidImage(msg),
            EngineError::NoFaceDetected => ApiError::NoFaceDetected,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::ProfileNotFound(id),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        ApiError::BadRequest(format!("malformed multipart body: {}", err.body_text()))
    }
}
