use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::proxy::config::ServerConfig;

/// Top-level contents of the configuration file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Directory served for requests no proxy rule claims. Absent means
    /// non-proxied requests get a 404.
    #[serde(default)]
    pub static_root: Option<PathBuf>,

    /// Optional directory for daily-rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

/// Load and validate the configuration file.
///
/// Every proxy rule is compiled here; a malformed target or rewrite pattern
/// is a load-time error and the server never starts.
pub fn load_config(path: &Path) -> AppResult<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: AppConfig = serde_json::from_str(&content)
        .map_err(|e| AppError::Config(format!("failed to parse {}: {}", path.display(), e)))?;

    config.server.compile_rules()?;
    Ok(config)
}
