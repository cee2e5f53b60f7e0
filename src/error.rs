//! Error types for the reel pool.

use crate::quality::Tier;
use thiserror::Error;

/// Misconfiguration detected at startup. Never a runtime path.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Settings file or environment could not be read or deserialized.
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    /// The prefetch window does not fit inside the pool.
    #[error(
        "Pool capacity {capacity} cannot hold a window of {ahead} ahead and {behind} behind"
    )]
    PoolTooSmall {
        capacity: usize,
        ahead: usize,
        behind: usize,
    },

    #[error("Invalid {field} for {tier} tier: {value}")]
    InvalidQuality {
        tier: Tier,
        field: &'static str,
        value: f64,
    },
}

/// Failure to produce a fresh item list. The previous list stays in place.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid manifest URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Catalog manifest could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failure reported by a media engine backend.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Media backend error: {0}")]
    Backend(String),

    #[error("Unknown segment {0}")]
    UnknownSegment(u64),
}

/// The feed's owner task is no longer running.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Feed service has shut down")]
    Closed,
}
