//! Configuration module - environment variable parsing

use std::env;
use std::path::PathBuf;

/// Client configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Game server WebSocket URL (e.g. `ws://127.0.0.1:10000/connect`)
    pub server_url: String,
    /// Display name sent as the `name` query parameter on connect
    pub player_name: String,
    /// Path to the walkability grid JSON; `None` falls back to an open mesh
    pub navmesh_path: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_url =
            env::var("SERVER_URL").unwrap_or_else(|_| "ws://127.0.0.1:10000/connect".to_string());
        if !server_url.starts_with("ws://") && !server_url.starts_with("wss://") {
            return Err(ConfigError::InvalidServerUrl);
        }

        let player_name = env::var("PLAYER_NAME").map_err(|_| ConfigError::Missing("PLAYER_NAME"))?;
        // The name travels un-escaped in the connect query string.
        if player_name.is_empty()
            || !player_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidPlayerName);
        }

        Ok(Self {
            server_url,
            player_name,
            navmesh_path: env::var("NAVMESH_PATH").ok().map(PathBuf::from),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("SERVER_URL must be a ws:// or wss:// URL")]
    InvalidServerUrl,

    #[error("PLAYER_NAME must be non-empty and contain only ASCII alphanumerics, '-' or '_'")]
    InvalidPlayerName,
}
