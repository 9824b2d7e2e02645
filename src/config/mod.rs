//! Process-wide configuration loading (ambient stack, §6 "Environment
//! variables").
//!
//! An optional TOML file overlaid with environment variable overrides,
//! falling back to a written-out default when no file exists. The fields
//! below are exactly the environment variables and per-platform knobs §6
//! and §4.E enumerate.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::prioritizer::PrioritizationStrategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub youtube: YoutubeConfig,
    #[serde(default)]
    pub rumble: RumbleConfig,
    #[serde(default)]
    pub odysee: OdyseeConfig,
    #[serde(default)]
    pub peertube: PeertubeConfig,
    #[serde(default = "default_strategy")]
    pub prioritization_strategy: PrioritizationStrategy,
    #[serde(default)]
    pub cache_backend: CacheBackend,
}

fn default_strategy() -> PrioritizationStrategy {
    PrioritizationStrategy::Balanced
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Memory,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub api_key: Option<String>,
    pub cookie_file: Option<PathBuf>,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            cookie_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RumbleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub api_token: Option<String>,
    #[serde(default = "default_rumble_actor")]
    pub actor_id: String,
}

impl Default for RumbleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_token: None,
            actor_id: default_rumble_actor(),
        }
    }
}

fn default_rumble_actor() -> String {
    "rumble-scraper".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdyseeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for OdyseeConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeertubeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub instances: Vec<String>,
}

impl Default for PeertubeConfig {
    fn default() -> Self {
        Self { enabled: true, instances: Vec::new() }
    }
}

fn default_true() -> bool {
    true
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            youtube: YoutubeConfig::default(),
            rumble: RumbleConfig::default(),
            odysee: OdyseeConfig::default(),
            peertube: PeertubeConfig::default(),
            prioritization_strategy: default_strategy(),
            cache_backend: CacheBackend::default(),
        }
    }
}

impl BrokerConfig {
    /// Load from `config_file` if it exists, else write out and return the
    /// default; then apply the environment-variable overrides §6 lists as
    /// the minimum set (`APIFY_API_TOKEN`, a YouTube-equivalent API key,
    /// per-platform enable toggles, the cookie file path).
    pub fn load(config_file: &str) -> anyhow::Result<Self> {
        let mut config = if std::path::Path::new(config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            toml::from_str(&contents)?
        } else {
            let default_config = Self::default();
            std::fs::write(config_file, toml::to_string_pretty(&default_config)?)?;
            default_config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("YOUTUBE_API_KEY") {
            self.youtube.api_key = Some(key);
        }
        if let Ok(path) = std::env::var("YOUTUBE_COOKIE_FILE") {
            self.youtube.cookie_file = Some(PathBuf::from(path));
        }
        if let Ok(token) = std::env::var("APIFY_API_TOKEN") {
            self.rumble.api_token = Some(token);
        }
        if let Ok(instances) = std::env::var("PEERTUBE_INSTANCES") {
            self.peertube.instances = instances.split(',').map(|s| s.trim().trim_end_matches('/').to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(strategy) = std::env::var("PRIORITIZATION_STRATEGY") {
            if let Ok(parsed) = serde_json::from_value(serde_json::Value::String(strategy)) {
                self.prioritization_strategy = parsed;
            }
        }

        for (flag, enabled) in [
            ("YOUTUBE_ENABLED", &mut self.youtube.enabled),
            ("RUMBLE_ENABLED", &mut self.rumble.enabled),
            ("ODYSEE_ENABLED", &mut self.odysee.enabled),
            ("PEERTUBE_ENABLED", &mut self.peertube.enabled),
        ] {
            if let Ok(value) = std::env::var(flag) {
                *enabled = matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_platform() {
        let config = BrokerConfig::default();
        assert!(config.youtube.enabled);
        assert!(config.rumble.enabled);
        assert!(config.odysee.enabled);
        assert!(config.peertube.enabled);
    }
}
