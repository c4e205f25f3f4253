//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.duet/config.json`) and environment.
//! Kept minimal: everything the signaling core needs fits in one section.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Signaling server settings.
    #[serde(default)]
    pub signaling: SignalingConfig,
}

/// Signaling bind, port, and relay hardening settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalingConfig {
    /// Port for HTTP and WebSocket (default 3000). Overridden by DUET_PORT env.
    #[serde(default = "default_signaling_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_signaling_bind")]
    pub bind: String,

    /// When true, relayed offers/answers/candidates are forwarded only when the
    /// target is a current co-member of the sender's room. Default false: the
    /// relay trusts the caller-supplied target, matching a two-member room where
    /// clients only ever address their just-learned peer.
    #[serde(default)]
    pub validate_relay_target: bool,
}

fn default_signaling_port() -> u16 {
    3000
}

fn default_signaling_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            port: default_signaling_port(),
            bind: default_signaling_bind(),
            validate_relay_target: false,
        }
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("DUET_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".duet").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Resolve the signaling port: env DUET_PORT overrides config when it parses.
pub fn resolve_port(config: &Config) -> u16 {
    std::env::var("DUET_PORT")
        .ok()
        .and_then(|s| s.trim().parse::<u16>().ok())
        .unwrap_or(config.signaling.port)
}

/// Load config from the default path (or DUET_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
