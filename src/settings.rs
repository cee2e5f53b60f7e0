//! Settings loaded from a TOML file layered under environment variables.

use crate::error::ConfigError;
use crate::quality::QualityPolicy;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default settings file looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "reel-pool";

/// Environment prefix, e.g. `REEL_POOL__POOL__CAPACITY=6`.
pub const ENV_PREFIX: &str = "REEL_POOL";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pool: PoolSettings,
    pub quality: QualityPolicy,
    pub catalog: CatalogSettings,
    pub autoplay: AutoplaySettings,
}

/// Pool size and prefetch window. Fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of Players alive at once.
    pub capacity: usize,
    /// Reels kept resident after the focused one.
    pub ahead: usize,
    /// Reels kept resident before the focused one.
    pub behind: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            capacity: 5,
            ahead: 2,
            behind: 2,
        }
    }
}

impl PoolSettings {
    /// The whole window must fit inside the pool.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity > self.ahead + self.behind {
            Ok(())
        } else {
            Err(ConfigError::PoolTooSmall {
                capacity: self.capacity,
                ahead: self.ahead,
                behind: self.behind,
            })
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// JSON manifest listing the feed's video URIs.
    pub manifest_url: String,
    pub timeout_secs: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            manifest_url: "https://cdn.dev.airxp.app/AgentVideos-HLS-Progressive/manifest.json"
                .into(),
            timeout_secs: 15,
        }
    }
}

impl CatalogSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Kiosk mode of the `reel-pool` binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutoplaySettings {
    /// Seconds between automatic scrolls to the next reel.
    pub advance_secs: u64,
}

impl Default for AutoplaySettings {
    fn default() -> Self {
        Self { advance_secs: 8 }
    }
}

impl Settings {
    /// Load settings from `path` (required) or `reel-pool.toml` (optional),
    /// then apply `REEL_POOL__*` overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_SETTINGS_FILE).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        tracing::debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool.validate()?;
        self.quality.validate()
    }
}
