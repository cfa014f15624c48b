use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables at startup.
///
/// API credentials may be absent here — the settings store (see
/// `crate::settings`) layers file-persisted and runtime-updated values on
/// top of these env-derived defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the ATS Harvest-style REST API.
    pub ats_base_url: String,
    /// Base URL of the ATS web UI, used to construct candidate deep links.
    pub ats_ui_base_url: String,
    pub ats_api_key: String,
    /// User identifier sent in the impersonation header on mutating calls.
    pub ats_on_behalf_of: String,
    pub anthropic_api_key: String,
    /// Directory holding per-job embedding index files.
    pub data_dir: PathBuf,
    /// Path of the JSON settings file (credential overrides).
    pub settings_path: PathBuf,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let data_dir =
            PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()));
        let settings_path = std::env::var("SETTINGS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("settings.json"));

        Ok(Config {
            ats_base_url: std::env::var("ATS_BASE_URL")
                .unwrap_or_else(|_| "https://harvest.greenhouse.io/v1".to_string()),
            ats_ui_base_url: std::env::var("ATS_UI_BASE_URL")
                .unwrap_or_else(|_| "https://app.greenhouse.io".to_string()),
            ats_api_key: optional_env("GREENHOUSE_API_KEY"),
            ats_on_behalf_of: optional_env("GREENHOUSE_ON_BEHALF_OF"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            data_dir,
            settings_path,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Reads an env var that is allowed to be missing (settable later at runtime
/// through the settings endpoint). Missing values become empty strings.
fn optional_env(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}
