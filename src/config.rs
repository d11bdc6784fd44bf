//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILTRACE_CONFIG` (environment variable)
//! 2. `~/.config/mailtrace/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailtrace\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! The geolocation API token is never compiled in. It comes from the
//! `[geolocation] token` key or from `$MAILTRACE_IPINFO_TOKEN`, which wins.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable that overrides the configured geolocation token.
pub const TOKEN_ENV: &str = "MAILTRACE_IPINFO_TOKEN";

/// Name of the log file inside the cache directory.
pub const LOG_FILE_NAME: &str = "mailtrace.log";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Geolocation client settings.
    pub geolocation: GeolocationConfig,
    /// Report artifact settings.
    pub report: ReportConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// `strftime` format string for dates printed by the CLI.
    pub date_format: String,
}

/// Geolocation client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    /// Set to `false` to never contact the geolocation service.
    pub enabled: bool,
    /// Base URL of an ipinfo-compatible service.
    pub endpoint: String,
    /// API token. Prefer `$MAILTRACE_IPINFO_TOKEN` over storing it here.
    pub token: Option<String>,
    /// Per-request timeout, also the bound on waiting for a background lookup.
    pub timeout_secs: u64,
    /// Extra attempts after a transport failure.
    pub retries: u32,
}

/// Report artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory for reports and maps (default: current directory).
    pub output_dir: Option<PathBuf>,
    /// Attempt geolocation when generating a report.
    pub include_geolocation: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://ipinfo.io".to_string(),
            token: None,
            timeout_secs: 10,
            retries: 1,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            include_geolocation: true,
        }
    }
}

impl GeolocationConfig {
    /// The token to use: environment first, then the config file.
    pub fn resolved_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.token.clone().filter(|t| !t.trim().is_empty()))
    }
}

// ── Load ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILTRACE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailtrace").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailtrace")
}

/// Return the directory where reports and maps are written.
pub fn output_dir(config: &Config) -> PathBuf {
    config
        .report
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."))
}
