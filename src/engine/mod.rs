//! Media engine seam.
//!
//! An engine owns the decoding side of one Player: a queue of segments, play
//! and pause, and per-segment buffering hints. Notifications come back on
//! whatever thread the backend uses and are marshaled onto the owner through
//! a [`Notifier`], tagged with the Player's slot and binding generation so
//! that the owner can drop anything from a previous binding.

#[cfg(feature = "gstreamer")]
pub mod playbin;

use crate::error::EngineError;
use std::fmt;
use tokio::sync::mpsc;
use url::Url;

/// Segment handle issued by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub u64);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment#{}", self.0)
    }
}

/// Position of a Player in the pool, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub usize);

impl SlotId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// What an engine observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSignal {
    /// The current segment can start without stalling.
    Ready,
    /// The given segment played to its end.
    SegmentEnded(SegmentId),
}

/// A notification marshaled from an engine to the pool owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineEvent {
    pub slot: SlotId,
    pub generation: u64,
    pub signal: EngineSignal,
}

/// Sends notifications for one Player binding to the owner.
///
/// Safe to call from any thread. Sends after the owner is gone are dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<EngineEvent>,
    slot: SlotId,
    generation: u64,
}

impl Notifier {
    pub fn new(tx: mpsc::UnboundedSender<EngineEvent>, slot: SlotId, generation: u64) -> Self {
        Self {
            tx,
            slot,
            generation,
        }
    }

    pub fn ready(&self) {
        self.send(EngineSignal::Ready);
    }

    pub fn segment_ended(&self, segment: SegmentId) {
        self.send(EngineSignal::SegmentEnded(segment));
    }

    fn send(&self, signal: EngineSignal) {
        let _ = self.tx.send(EngineEvent {
            slot: self.slot,
            generation: self.generation,
            signal,
        });
    }
}

/// One playback resource with a segment queue.
///
/// Contract the Player relies on:
/// - when a segment finishes and another is queued behind it, the finished
///   one is dropped and playback advances without a gap; a lone finished
///   segment stays loaded and replays from the start; both are reported
///   through the segment-end observer;
/// - `replace_segment` discards the whole queue and leaves the engine paused;
/// - `observe_ready` reports right away if the current segment is already
///   ready; registering an observer replaces the previous one.
#[cfg_attr(test, mockall::automock)]
pub trait MediaEngine: Send {
    fn play(&mut self) -> Result<(), EngineError>;

    fn pause(&mut self) -> Result<(), EngineError>;

    /// Drop every queued segment and load `source` as the only one.
    fn replace_segment(&mut self, source: &Url) -> Result<SegmentId, EngineError>;

    /// Queue `source` after the last segment.
    fn append_segment(&mut self, source: &Url) -> Result<SegmentId, EngineError>;

    fn remove_segment(&mut self, segment: SegmentId) -> Result<(), EngineError>;

    fn set_buffer_duration_hint(&mut self, segment: SegmentId, seconds: f64);

    /// `0` means uncapped.
    fn set_peak_bitrate_hint(&mut self, segment: SegmentId, bits_per_second: f64);

    fn observe_ready(&mut self, notifier: Notifier);

    fn observe_segment_end(&mut self, notifier: Notifier);

    /// Stop delivering notifications to the current observers.
    fn detach_observers(&mut self);
}

/// Creates engines as the pool grows.
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn MediaEngine>, EngineError>;
}
