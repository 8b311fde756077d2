//! Centralized path utilities
//!
//! All application paths in one place for consistency

use std::path::PathBuf;

const CONFIG_DIR_NAME: &str = ".outrigger";

/// Get the outrigger config directory (~/.outrigger)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Get the default plugins root (~/.outrigger/plugins)
pub fn plugins_dir() -> PathBuf {
    config_dir().join("plugins")
}

/// Get the logs directory (~/.outrigger/logs)
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}
