//! Outrigger Server
//!
//! HTTP boundary between the privileged plugin registry and the isolated
//! front-end. This is a library crate — the server is started via
//! `start_server()`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use outrigger_core::{
    paths, AssetGateway, DirectoryFetcher, InstallConfirmer, LifecycleEngine, PackageFetcher,
    RegistryStore,
};

pub mod error;
pub mod routes;

/// Configuration for starting the server.
pub struct ServerConfig {
    /// Port to listen on (default: 3070).
    pub port: u16,
    /// Root directory holding installed plugins and the registry file.
    pub plugins_root: PathBuf,
    /// Install gate. Installs over the bridge fail with a configuration
    /// error until one is supplied.
    pub confirmer: Option<Arc<dyn InstallConfirmer>>,
    /// Package resolution collaborator.
    pub fetcher: Arc<dyn PackageFetcher>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3070,
            plugins_root: paths::plugins_dir(),
            confirmer: None,
            fetcher: Arc::new(DirectoryFetcher),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LifecycleEngine>,
    pub gateway: Arc<AssetGateway>,
}

impl AppState {
    /// Wire store, engine, and gateway around a plugins root that has
    /// already been (or will be) loaded.
    pub fn new(engine: Arc<LifecycleEngine>, gateway: Arc<AssetGateway>) -> Self {
        Self { engine, gateway }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the full router over shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", routes::api_router())
        .nest("/plugin-assets", routes::asset_router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Rebuild the registry from disk, then serve until the process exits.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let store = Arc::new(RegistryStore::new());
    if let Some(confirmer) = config.confirmer {
        store.set_install_confirmer(confirmer);
    }

    let engine = Arc::new(LifecycleEngine::new(store.clone(), config.fetcher));
    engine.load(&config.plugins_root).await?;

    let gateway = Arc::new(AssetGateway::new(store));
    let app = build_router(AppState::new(engine, gateway));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!("outrigger server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
