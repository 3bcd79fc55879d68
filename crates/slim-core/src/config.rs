//! Configuration system for SLIM endpoints.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $SLIM_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/slim/config.toml
//!   3. ~/.config/slim/config.toml

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlimConfig {
    pub network: NetworkConfig,
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address a server endpoint binds to.
    pub host: String,
    /// UDP port. 0 = OS-assigned.
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Seconds before a partial reassembly is evicted.
    pub reassembly_timeout_secs: u64,
    /// Seconds between eviction sweeps.
    pub sweep_interval_secs: u64,
    /// Whether an evicted reassembly is answered with a timeout
    /// rejection signal.
    pub reject_on_timeout: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5151,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reassembly_timeout_secs: 5,
            sweep_interval_secs: 1,
            reject_on_timeout: true,
        }
    }
}

impl TransportConfig {
    pub fn reassembly_timeout(&self) -> Duration {
        Duration::from_secs(self.reassembly_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

// ── Path helpers ─────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_or_tmp().join(".config"))
        .join("slim")
}

fn home_or_tmp() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

// ── Loading ──────────────────────────────────────────────────────────────────

impl SlimConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            SlimConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("SLIM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Apply SLIM_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SLIM_NETWORK__HOST") {
            self.network.host = v;
        }
        if let Ok(v) = std::env::var("SLIM_NETWORK__PORT") {
            if let Ok(p) = v.parse() {
                self.network.port = p;
            }
        }
        if let Ok(v) = std::env::var("SLIM_TRANSPORT__REASSEMBLY_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse() {
                self.transport.reassembly_timeout_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("SLIM_TRANSPORT__SWEEP_INTERVAL_SECS") {
            if let Ok(secs) = v.parse() {
                self.transport.sweep_interval_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("SLIM_TRANSPORT__REJECT_ON_TIMEOUT") {
            self.transport.reject_on_timeout = v == "true" || v == "1";
        }
    }
}
