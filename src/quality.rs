//! Per-tier buffering and bitrate hints.
//!
//! A Player's tier says how close its reel is to the focused one; the policy
//! turns that into hints for the media engine. Nothing here talks to an
//! engine directly.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality-of-service class of a Player relative to the focused reel.
///
/// `Neighbor` and `PrefetchFar` are both "not focused" but get different
/// hints; at most one Player is `Active` at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Idle,
    PrefetchFar,
    Neighbor,
    Active,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Idle => "idle",
            Tier::PrefetchFar => "prefetch_far",
            Tier::Neighbor => "neighbor",
            Tier::Active => "active",
        }
    }

    /// Tiers that keep a pre-queued loop segment behind the current one.
    pub fn keeps_loop_tail(&self) -> bool {
        matches!(self, Tier::Active | Tier::Neighbor)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hints handed to the media engine for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierHints {
    /// Preferred forward buffer, in seconds.
    pub buffer_seconds: f64,
    /// Peak bitrate cap in bits per second. `0` means uncapped.
    pub peak_bitrate: f64,
}

impl TierHints {
    pub const fn new(buffer_seconds: f64, peak_bitrate: f64) -> Self {
        Self {
            buffer_seconds,
            peak_bitrate,
        }
    }
}

/// Maps tiers to [`TierHints`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityPolicy {
    /// High quality for the reel on screen.
    pub active: TierHints,
    /// Good enough to start instantly when scrolled to.
    pub neighbor: TierHints,
    /// Warm-up for reels further ahead, with a bitrate cap.
    pub prefetch_far: TierHints,
    /// No buffering.
    pub idle: TierHints,
    /// Forward buffer for the loop segment queued behind the current one.
    pub loop_tail_buffer_seconds: f64,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            active: TierHints::new(10.0, 0.0),
            neighbor: TierHints::new(7.0, 0.0),
            prefetch_far: TierHints::new(5.0, 4_000_000.0),
            idle: TierHints::new(0.0, 0.0),
            loop_tail_buffer_seconds: 3.0,
        }
    }
}

impl QualityPolicy {
    pub fn hints_for(&self, tier: Tier) -> TierHints {
        match tier {
            Tier::Active => self.active,
            Tier::Neighbor => self.neighbor,
            Tier::PrefetchFar => self.prefetch_far,
            Tier::Idle => self.idle,
        }
    }

    /// Hints for a segment queued in advance for looping.
    pub fn loop_tail_hints(&self, tier: Tier) -> TierHints {
        TierHints {
            buffer_seconds: self.loop_tail_buffer_seconds,
            ..self.hints_for(tier)
        }
    }

    /// Reject negative or non-finite hints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for tier in [Tier::Active, Tier::Neighbor, Tier::PrefetchFar, Tier::Idle] {
            let hints = self.hints_for(tier);
            check_hint(tier, "buffer_seconds", hints.buffer_seconds)?;
            check_hint(tier, "peak_bitrate", hints.peak_bitrate)?;
        }
        check_hint(Tier::Active, "loop_tail_buffer_seconds", self.loop_tail_buffer_seconds)
    }
}

fn check_hint(tier: Tier, field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidQuality { tier, field, value })
    }
}
