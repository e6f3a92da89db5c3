//! Configuration loading and API key resolution
//!
//! Provides multi-tier API key resolution with CLI → ENV → TOML
//! priority. When more than one source carries a usable key, the
//! highest-priority source wins and the overlap is logged as a
//! potential misconfiguration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Environment variable consulted for the identity service API key.
pub const API_KEY_ENV: &str = "TUNESMITH_API_KEY";

/// Persistent settings from the optional TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Identity service API key
    pub api_key: Option<String>,
    /// Fingerprint generator binary (default: fpcalc)
    pub fingerprint_command: Option<String>,
    /// Loudness gain calculator binary (default: mp3gain)
    pub gain_command: Option<String>,
    /// Transcoder binary (default: ffmpeg)
    pub transcode_command: Option<String>,
    /// Default worker concurrency
    pub concurrency: Option<usize>,
}

/// Load the TOML config from an explicit path.
///
/// A missing file at an explicitly configured path is a
/// configuration-level failure; callers that have no config path just
/// use `TomlConfig::default()`.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read config {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse config {} failed: {}", path.display(), e)))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the identity service API key from 3-tier configuration.
///
/// Priority: CLI flag → `TUNESMITH_API_KEY` → TOML config. Returns
/// `None` when no tier carries a usable key; the run then proceeds in
/// fingerprint-only mode.
pub fn resolve_api_key(cli_arg: Option<&str>, toml_config: &TomlConfig) -> Option<String> {
    let cli_key = cli_arg.filter(|k| is_valid_key(k)).map(str::to_string);
    let env_key = std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .api_key
        .as_deref()
        .filter(|k| is_valid_key(k))
        .map(str::to_string);

    let mut sources = Vec::new();
    if cli_key.is_some() {
        sources.push("command line");
    }
    if env_key.is_some() {
        sources.push("environment");
    }
    if toml_key.is_some() {
        sources.push("TOML config");
    }

    if sources.len() > 1 {
        warn!(
            "API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = cli_key {
        info!("API key loaded from command line");
        return Some(key);
    }
    if let Some(key) = env_key {
        info!("API key loaded from environment variable");
        return Some(key);
    }
    if let Some(key) = toml_key {
        info!("API key loaded from TOML config");
        return Some(key);
    }

    None
}
