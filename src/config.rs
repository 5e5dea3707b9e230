//! Application configuration
//!
//! Layered the usual way: embedded defaults, optional files under `config/`,
//! then `EVENTBUS_*` environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub redis: RedisConfig,
}

/// Transport selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process broadcast, only this process sees its payloads
    #[default]
    Memory,
    /// Redis pub/sub, shared by every process on the channel
    Redis,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Redis => write!(f, "redis"),
        }
    }
}

/// Bus settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

fn default_buffer() -> usize {
    64
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            buffer: default_buffer(),
        }
    }
}

/// Redis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_channel() -> String {
    "eventbus:events".to_string()
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            channel: default_channel(),
        }
    }
}

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. Per-environment and local overrides (optional)
        .add_source(
            File::with_name(&format!(
                "config/{}",
                std::env::var("EVENTBUS_ENV").unwrap_or_else(|_| "development".to_string())
            ))
            .required(false),
        )
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority), e.g. EVENTBUS_REDIS__URL
        .add_source(
            Environment::with_prefix("EVENTBUS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_parse() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.bus.backend, Backend::Memory);
        assert_eq!(config.bus.buffer, 64);
        assert_eq!(config.redis.channel, "eventbus:events");
    }

    #[test]
    fn test_overrides_apply() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(
                "[bus]\nbackend = \"redis\"\n[redis]\nchannel = \"orders\"\n",
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.bus.backend, Backend::Redis);
        assert_eq!(config.bus.buffer, 64);
        assert_eq!(config.redis.channel, "orders");
        assert_eq!(config.redis.url, "redis://127.0.0.1:6379");
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: AppConfig = Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.bus.backend, Backend::Memory);
        assert_eq!(config.redis.url, "redis://127.0.0.1:6379");
    }
}
