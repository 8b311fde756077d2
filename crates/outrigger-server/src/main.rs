use std::path::PathBuf;
use std::sync::Arc;

use outrigger_core::{paths, StaticConfirmer};
use outrigger_server::{start_server, ServerConfig};

const DEFAULT_PORT: u16 = 3070;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let port = std::env::var("OUTRIGGER_PORT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let plugins_root = std::env::var("OUTRIGGER_PLUGINS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| paths::plugins_dir());

    let mut config = ServerConfig {
        port,
        plugins_root,
        ..Default::default()
    };

    // Headless deployments have no confirmation dialog; installs stay
    // disabled unless explicitly pre-approved.
    if std::env::var("OUTRIGGER_AUTO_CONFIRM").as_deref() == Ok("1") {
        tracing::warn!("OUTRIGGER_AUTO_CONFIRM=1: all plugin installs are pre-approved");
        config.confirmer = Some(Arc::new(StaticConfirmer(true)));
    }

    start_server(config).await
}
