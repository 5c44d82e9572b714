//! Configuration module for the quizdeck backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Auth token handed to the chat gateway (opaque, not consumed internally)
    pub gateway_token: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let gateway_token = env::var("QUIZDECK_GATEWAY_TOKEN").ok();

        let db_path = env::var("QUIZDECK_DB_PATH")
            .unwrap_or_else(|_| "./data/quizdeck.sqlite".to_string())
            .into();

        let log_level = env::var("QUIZDECK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            gateway_token,
            db_path,
            log_level,
        }
    }
}
