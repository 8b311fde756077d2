//! Plugin asset serving.
//!
//! Realizes the front-end's custom asset scheme as a plain HTTP route: the
//! wildcard tail is handed to the asset gateway, which is the trust boundary.

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::Response,
    routing::get,
    Router,
};
use tokio::fs;

use crate::error::AppError;
use crate::AppState;

/// Build the asset router
pub fn router() -> Router<AppState> {
    Router::new().route("/*path", get(serve_asset))
}

/// Serve one resolved file from under the plugins root.
async fn serve_asset(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let resolved = state.gateway.resolve(&path).await?;

    let bytes = fs::read(&resolved)
        .await
        .map_err(|e| AppError::Internal(format!("failed to read {}: {}", resolved.display(), e)))?;

    let mime = mime_guess::from_path(&resolved).first_or_octet_stream();
    Response::builder()
        .header(header::CONTENT_TYPE, mime.as_ref())
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(format!("failed to build response: {}", e)))
}
