//! API routes

use axum::Router;

use crate::AppState;

mod assets;
pub mod bridge;

/// Build the API router with all endpoints
pub fn api_router() -> Router<AppState> {
    Router::new().nest("/bridge", bridge::router())
}

/// Build the plugin asset router
pub fn asset_router() -> Router<AppState> {
    assets::router()
}
