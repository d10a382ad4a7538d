use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tracing::{instrument, warn};

use super::services::presign_upload;
use crate::state::AppState;

pub fn uploads_router() -> Router<AppState> {
    Router::new().route("/uploads/*key", get(get_upload))
}

/// 302 to a short-lived presigned URL for a stored image.
#[instrument(skip(state))]
pub async fn get_upload(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    if key.is_empty() || key.split('/').any(|seg| seg == "..") {
        return (StatusCode::NOT_FOUND, "Image not found").into_response();
    }

    match presign_upload(state.storage.as_ref(), &key).await {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(e) => {
            warn!(error = %e, %key, "presign failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "presign failed").into_response()
        }
    }
}
