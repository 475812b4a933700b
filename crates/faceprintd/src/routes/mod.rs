//! REST handlers.
//!
//! - `profiles`: enrollment, lookup, listing, verification
//! - `analysis`: multi-model analysis and two-image comparison
//! - `health`: liveness and loaded-model status

pub mod analysis;
pub mod health;
pub mod profiles;

use axum::extract::multipart::{Multipart, MultipartRejection};

use crate::error::{ApiError, ApiResult};

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Pull the named file parts out of a multipart body, in the order given.
///
/// Parts with other names are skipped. A part that declares a non-image
/// content type, or a name that never appears, is a bad request.
pub(crate) async fn read_files<const N: usize>(
    multipart: Result<Multipart, MultipartRejection>,
    names: [&str; N],
) -> ApiResult<[Vec<u8>; N]> {
    let mut multipart =
        multipart.map_err(|e| ApiError::BadRequest(format!("expected multipart upload: {}", e.body_text())))?;
    let mut found: [Option<Vec<u8>>; N] = std::array::from_fn(|_| None);

    while let Some(field) = multipart.next_field().await? {
        let Some(slot) = field
            .name()
            .and_then(|name| names.iter().position(|n| *n == name))
        else {
            continue;
        };
        if let Some(ct) = field.content_type() {
            if !ct.starts_with("image/") {
                return Err(ApiError::BadRequest(format!(
                    "part {:?} must be an image, got {ct}",
                    names[slot]
                )));
            }
        }
        found[slot] = Some(field.bytes().await?.to_vec());
    }

    let mut out: [Vec<u8>; N] = std::array::from_fn(|_| Vec::new());
    for (i, slot) in found.into_iter().enumerate() {
        out[i] = slot.ok_or_else(|| ApiError::BadRequest(format!("missing file part {:?}", names[i])))?;
    }
    Ok(out)
}
