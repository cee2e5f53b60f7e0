//! Pooled, rebindable playback resource.
//!
//! A Player owns one media engine and is bound to at most one reel at a time.
//! It keeps a loop queue of one or two segments of the same source: the
//! current one plus, for focused and neighboring reels, a pre-queued copy so
//! that looping never waits on a decode.

use crate::engine::{EngineEvent, MediaEngine, Notifier, SegmentId, SlotId};
use crate::item::{ItemId, Reel};
use crate::quality::{QualityPolicy, Tier, TierHints};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

/// Longest loop queue a Player ever holds.
pub const MAX_QUEUED_SEGMENTS: usize = 2;

/// Point-in-time view of a Player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatus {
    pub slot: SlotId,
    pub item: Option<ItemId>,
    pub tier: Tier,
    pub ready: bool,
    pub playing: bool,
    pub queued_segments: usize,
}

pub struct Player {
    slot: SlotId,
    engine: Box<dyn MediaEngine>,
    policy: Arc<QualityPolicy>,
    events: mpsc::UnboundedSender<EngineEvent>,
    item: Option<ItemId>,
    source: Option<Url>,
    tier: Tier,
    ready: bool,
    playing: bool,
    /// Focus target waiting for readiness. Replaced, never queued.
    pending_ready: Option<ItemId>,
    queue: VecDeque<SegmentId>,
    /// Bumped on every rebind; notifications from older bindings are ignored.
    generation: u64,
}

impl Player {
    /// Create an unbound Player around `engine`.
    pub fn new(
        slot: SlotId,
        engine: Box<dyn MediaEngine>,
        policy: Arc<QualityPolicy>,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            slot,
            engine,
            policy,
            events,
            item: None,
            source: None,
            tier: Tier::Idle,
            ready: false,
            playing: false,
            pending_ready: None,
            queue: VecDeque::new(),
            generation: 0,
        }
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn bound_item(&self) -> Option<&ItemId> {
        self.item.as_ref()
    }

    pub fn source(&self) -> Option<&Url> {
        self.source.as_ref()
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn queued_segments(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_ready(&self) -> Option<&ItemId> {
        self.pending_ready.as_ref()
    }

    pub fn status(&self) -> PlayerStatus {
        PlayerStatus {
            slot: self.slot,
            item: self.item.clone(),
            tier: self.tier,
            ready: self.ready,
            playing: self.playing,
            queued_segments: self.queue.len(),
        }
    }

    /// Bind this Player to `reel`.
    ///
    /// Rebinding to the same source keeps playback state and only adopts the
    /// new identity. Otherwise the old binding's observers are detached, any
    /// pending readiness intent is dropped, and the queue is rebuilt.
    pub fn configure(&mut self, reel: &Reel) {
        if self.source.as_ref() == Some(&reel.source) {
            let was_released = self.item.is_none();
            self.item = Some(reel.id.clone());
            if was_released && !self.ready {
                // A ready signal may have been dropped while unbound.
                self.engine.observe_ready(self.notifier());
            }
            return;
        }

        self.engine.detach_observers();
        self.ready = false;
        self.pending_ready = None;
        self.playing = false;
        self.generation += 1;
        self.item = Some(reel.id.clone());
        self.source = Some(reel.source.clone());
        self.queue.clear();

        tracing::debug!(
            "{} bound to {} (generation {})",
            self.slot,
            reel.id,
            self.generation
        );

        match self.engine.replace_segment(&reel.source) {
            Ok(segment) => {
                self.queue.push_back(segment);
                self.apply_hints(segment, self.policy.hints_for(self.tier));
            }
            Err(e) => {
                tracing::warn!("Failed to load {} on {}: {}", reel.id, self.slot, e);
            }
        }

        self.engine.observe_ready(self.notifier());
        self.engine.observe_segment_end(self.notifier());
    }

    /// Forget the bound reel after it left the catalog.
    ///
    /// The Player drops to `Idle` and stops playing. The engine keeps the
    /// current segment loaded; a later rebind to the same source picks it
    /// back up.
    pub fn release(&mut self) {
        self.item = None;
        self.pending_ready = None;
        self.tier = Tier::Idle;
        self.apply_tier();
        if self.playing {
            self.pause();
        }
    }

    /// Assign a tier and re-apply queue and quality policy.
    pub fn set_tier(&mut self, tier: Tier) {
        if self.tier != tier {
            tracing::trace!("{} tier {} -> {}", self.slot, self.tier, tier);
        }
        self.tier = tier;
        self.apply_tier();
    }

    pub fn play(&mut self) {
        match self.engine.play() {
            Ok(()) => self.playing = true,
            Err(e) => tracing::warn!("Failed to play {}: {}", self.slot, e),
        }
    }

    pub fn pause(&mut self) {
        if let Err(e) = self.engine.pause() {
            tracing::warn!("Failed to pause {}: {}", self.slot, e);
        }
        self.playing = false;
    }

    /// Run `target`'s start intent once this Player is ready.
    ///
    /// Returns the target back when already ready so the caller can act right
    /// away; otherwise stores it, replacing any earlier intent.
    pub fn when_ready(&mut self, target: ItemId) -> Option<ItemId> {
        if self.ready {
            Some(target)
        } else {
            self.pending_ready = Some(target);
            None
        }
    }

    /// Handle a readiness notification.
    ///
    /// Returns the pending intent exactly once, on the first ready signal of
    /// the current binding.
    pub fn on_ready(&mut self, generation: u64) -> Option<ItemId> {
        if !self.accepts(generation) || self.ready {
            return None;
        }
        self.ready = true;
        self.pending_ready.take()
    }

    /// Handle the end of a queued segment.
    pub fn on_segment_end(&mut self, generation: u64, ended: SegmentId) {
        if !self.accepts(generation) {
            return;
        }

        // The engine advanced past the finished segment if one was queued.
        if self.queue.len() > 1 && self.queue.front() == Some(&ended) {
            self.queue.pop_front();
        }

        if self.tier != Tier::Active {
            return;
        }

        self.ensure_loop_tail();
        if let Some(&current) = self.queue.front() {
            self.apply_hints(current, self.policy.hints_for(self.tier));
        }
    }

    fn accepts(&self, generation: u64) -> bool {
        self.item.is_some() && generation == self.generation
    }

    fn notifier(&self) -> Notifier {
        Notifier::new(self.events.clone(), self.slot, self.generation)
    }

    fn apply_tier(&mut self) {
        let Some(&current) = self.queue.front() else {
            return;
        };
        self.apply_hints(current, self.policy.hints_for(self.tier));

        if self.tier.keeps_loop_tail() {
            self.ensure_loop_tail();
        } else {
            self.pause();
            self.trim_to_current();
        }
    }

    /// Keep exactly the current segment plus one loop segment.
    fn ensure_loop_tail(&mut self) {
        if self.queue.len() == 1 {
            if let Some(source) = self.source.clone() {
                match self.engine.append_segment(&source) {
                    Ok(tail) => {
                        self.queue.push_back(tail);
                        self.apply_hints(tail, self.policy.loop_tail_hints(self.tier));
                    }
                    Err(e) => tracing::warn!("Failed to queue loop on {}: {}", self.slot, e),
                }
            }
        }
        self.trim_to(MAX_QUEUED_SEGMENTS);
    }

    fn trim_to_current(&mut self) {
        self.trim_to(1);
    }

    /// Drop trailing segments beyond `keep`. The current one is never removed.
    fn trim_to(&mut self, keep: usize) {
        while self.queue.len() > keep.max(1) {
            if let Some(segment) = self.queue.pop_back() {
                if let Err(e) = self.engine.remove_segment(segment) {
                    tracing::warn!("Failed to drop {} on {}: {}", segment, self.slot, e);
                }
            }
        }
    }

    fn apply_hints(&mut self, segment: SegmentId, hints: TierHints) {
        self.engine
            .set_buffer_duration_hint(segment, hints.buffer_seconds);
        self.engine.set_peak_bitrate_hint(segment, hints.peak_bitrate);
    }
}
