use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use class_portal_core::{blob, PortalError};

use super::{error::ApiError, AppState};

/// Serve stored upload bytes by blob key.
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !blob::is_valid_key(&filename) {
        return Err(state.error(PortalError::FileNotFound));
    }
    if !state
        .blobs
        .exists(&filename)
        .await
        .map_err(|e| state.error(e))?
    {
        return Err(state.error(PortalError::FileNotFound));
    }
    let data = state
        .blobs
        .get(&filename)
        .await
        .map_err(|e| state.error(e))?;
    Ok((
        [
            (header::CONTENT_TYPE, blob::content_type(&filename)),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        data,
    ))
}
