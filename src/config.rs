//! # Engine Configuration
//! Loaded from `config/engine.toml`, every field optional with embedded
//! defaults; the base URL can additionally be overridden from the
//! environment. Loading never fails startup: unreadable or malformed config
//! logs a warning and falls back to defaults.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/engine.toml";
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api/v1";

pub const ENV_CONFIG_PATH: &str = "NOMADMATCH_CONFIG_PATH";
pub const ENV_API_BASE: &str = "NOMADMATCH_API_BASE";

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Backend base path, e.g. `http://localhost:8000/api/v1`.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Results requested per search.
    #[serde(default = "default_num_results")]
    pub num_results: u32,
    /// Below this many live results the embedded catalog substitutes.
    #[serde(default = "default_min_live_results")]
    pub min_live_results: usize,
    /// Results requested for the premium advice view.
    #[serde(default = "default_premium_num_results")]
    pub premium_num_results: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}
fn default_num_results() -> u32 {
    15
}
fn default_min_live_results() -> usize {
    5
}
fn default_premium_num_results() -> u32 {
    5
}
fn default_connect_timeout_secs() -> u64 {
    4
}
fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        toml::from_str("").expect("defaults deserialize")
    }
}

impl EngineConfig {
    /// Load from `NOMADMATCH_CONFIG_PATH` (or the default path), then apply
    /// env overrides. Missing file is the normal dev case and stays silent.
    pub fn load() -> Self {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut cfg = match fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "bad engine config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        };

        if let Ok(base) = std::env::var(ENV_API_BASE) {
            if !base.trim().is_empty() {
                cfg.api_base = base;
            }
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_are_sane() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.num_results, 15);
        assert_eq!(cfg.min_live_results, 5);
        assert_eq!(cfg.premium_num_results, 5);
        assert_eq!(cfg.connect_timeout_secs, 4);
        assert_eq!(cfg.request_timeout_secs, 10);
    }

    #[test]
    fn partial_toml_fills_the_rest() {
        let cfg: EngineConfig = toml::from_str("num_results = 20").unwrap();
        assert_eq!(cfg.num_results, 20);
        assert_eq!(cfg.min_live_results, 5);
    }

    #[test]
    #[serial]
    fn env_overrides_base_url() {
        std::env::set_var(ENV_API_BASE, "http://api.example.test/v2");
        let cfg = EngineConfig::load();
        assert_eq!(cfg.api_base, "http://api.example.test/v2");
        std::env::remove_var(ENV_API_BASE);
    }

    #[test]
    #[serial]
    fn missing_file_falls_back_to_defaults() {
        std::env::set_var(ENV_CONFIG_PATH, "/nonexistent/engine.toml");
        let cfg = EngineConfig::load();
        assert_eq!(cfg.num_results, 15);
        std::env::remove_var(ENV_CONFIG_PATH);
    }
}
