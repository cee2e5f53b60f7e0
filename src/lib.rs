//! Bounded pool of streaming players for a scrollable reel feed.
//!
//! A fixed number of heavyweight playback resources is kept bound to the
//! reels around the focused one. Scrolling rebinds the least useful Player
//! instead of creating new ones, assigns each Player a quality tier, and
//! starts the focused reel once its Player reports ready.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod feed;
pub mod gate;
pub mod item;
pub mod player;
pub mod pool;
pub mod quality;
pub mod service;
pub mod settings;
pub mod window;

pub use catalog::{CatalogSource, HttpCatalog};
pub use engine::{EngineEvent, EngineFactory, EngineSignal, MediaEngine, Notifier, SegmentId, SlotId};
pub use error::{CatalogError, ConfigError, EngineError, ServiceError};
pub use feed::{FeedSnapshot, FocusChange, ReelFeed};
pub use gate::GateDecision;
pub use item::{ItemId, Reel};
pub use player::{Player, PlayerStatus};
pub use pool::{FocusOutcome, FocusState, PoolCoordinator};
pub use quality::{QualityPolicy, Tier, TierHints};
pub use service::{spawn_feed, FeedEvent, FeedHandle};
pub use settings::Settings;
