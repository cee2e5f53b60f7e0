//! Fixed-capacity pool of Players mapped onto the feed.
//!
//! The coordinator owns the reel list, the Players and the focus state. It
//! keeps Players bound to every reel inside the prefetch window around the
//! focused reel, reusing the least useful Player when the pool is full.
//!
//! All mutation happens on the owner. Engine notifications reach it as
//! [`EngineEvent`]s through the channel handed to [`PoolCoordinator::new`].

use crate::engine::{EngineEvent, EngineFactory, EngineSignal, SlotId};
use crate::error::ConfigError;
use crate::item::{ItemId, Reel};
use crate::player::Player;
use crate::quality::{QualityPolicy, Tier};
use crate::settings::PoolSettings;
use crate::window;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Focused reel and the last one confirmed playing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusState {
    /// May point at a reel that is not ready yet.
    pub focused: Option<ItemId>,
    /// Last reel that actually reached ready and started playing.
    pub anchor: Option<ItemId>,
}

/// Result of [`PoolCoordinator::set_focus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusOutcome {
    /// Target missing or not in the catalog. Nothing changed.
    Ignored,
    /// Focus moved; playback starts once the target is ready.
    Pending,
    /// Focus moved and the target was already ready, so it is playing.
    Started,
}

pub struct PoolCoordinator {
    pool: PoolSettings,
    policy: Arc<QualityPolicy>,
    factory: Box<dyn EngineFactory>,
    events: mpsc::UnboundedSender<EngineEvent>,
    reels: Vec<Reel>,
    positions: HashMap<ItemId, usize>,
    /// Creation order; a slot's Player holds the reverse (slot -> item) link.
    players: Vec<Player>,
    bindings: HashMap<ItemId, SlotId>,
    focus: FocusState,
}

impl PoolCoordinator {
    /// Create an empty pool. Fails if the window cannot fit in the pool.
    pub fn new(
        pool: &PoolSettings,
        policy: QualityPolicy,
        factory: Box<dyn EngineFactory>,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<Self, ConfigError> {
        pool.validate()?;
        tracing::info!(
            "Player pool: capacity {}, {} ahead, {} behind",
            pool.capacity,
            pool.ahead,
            pool.behind
        );
        Ok(Self {
            pool: *pool,
            policy: Arc::new(policy),
            factory,
            events,
            reels: Vec::new(),
            positions: HashMap::new(),
            players: Vec::with_capacity(pool.capacity),
            bindings: HashMap::new(),
            focus: FocusState::default(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity
    }

    pub fn items(&self) -> &[Reel] {
        &self.reels
    }

    pub fn reel(&self, id: &ItemId) -> Option<&Reel> {
        self.index_of(id).map(|index| &self.reels[index])
    }

    pub fn index_of(&self, id: &ItemId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn focus(&self) -> &FocusState {
        &self.focus
    }

    /// Number of Players currently bound to a reel.
    pub fn bound_count(&self) -> usize {
        self.bindings.len()
    }

    /// Number of Players created so far. Never exceeds the capacity.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player_for(&self, id: &ItemId) -> Option<&Player> {
        self.bindings
            .get(id)
            .map(|slot| &self.players[slot.index()])
    }

    pub fn player_for_mut(&mut self, id: &ItemId) -> Option<&mut Player> {
        let slot = *self.bindings.get(id)?;
        Some(&mut self.players[slot.index()])
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn is_ready(&self, id: &ItemId) -> bool {
        self.player_for(id).map(Player::is_ready).unwrap_or(false)
    }

    pub fn is_focus_ready(&self) -> bool {
        self.focus
            .focused
            .as_ref()
            .map(|id| self.is_ready(id))
            .unwrap_or(false)
    }

    /// Index range kept resident around the current focus.
    pub fn window(&self) -> Option<RangeInclusive<usize>> {
        let focus_index = self.focus.focused.as_ref().and_then(|id| self.index_of(id));
        window::window_for(
            focus_index,
            self.reels.len(),
            self.pool.ahead,
            self.pool.behind,
        )
    }

    /// Replace the catalog and release Players whose reel disappeared.
    pub fn update_items(&mut self, reels: Vec<Reel>) {
        self.positions = reels
            .iter()
            .enumerate()
            .map(|(index, reel)| (reel.id.clone(), index))
            .collect();
        self.reels = reels;

        let stale: Vec<ItemId> = self
            .bindings
            .keys()
            .filter(|id| !self.positions.contains_key(*id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(slot) = self.unbind(&id) {
                self.players[slot.index()].release();
                tracing::debug!("Released {} after {} left the catalog", slot, id);
            }
        }

        if let Some(anchor) = self.focus.anchor.take() {
            if self.positions.contains_key(&anchor) {
                self.focus.anchor = Some(anchor);
            }
        }
    }

    /// Flip the liked flag of a reel. Returns the new value.
    pub fn toggle_like(&mut self, id: &ItemId) -> Option<bool> {
        let index = self.index_of(id)?;
        let reel = &mut self.reels[index];
        reel.liked = !reel.liked;
        Some(reel.liked)
    }

    /// Move focus to `to`. Callers must have cleared it with the transition gate.
    pub fn set_focus(&mut self, from: Option<&ItemId>, to: Option<&ItemId>) -> FocusOutcome {
        let Some(to) = to else {
            return FocusOutcome::Ignored;
        };
        let Some(target_index) = self.index_of(to) else {
            tracing::debug!("Ignoring focus on unknown reel {}", to);
            return FocusOutcome::Ignored;
        };

        self.focus.focused = Some(to.clone());

        if let Some(player) = from.and_then(|id| self.player_for_mut(id)) {
            player.pause();
        }

        let Some(window) = self.window() else {
            return FocusOutcome::Pending;
        };

        for index in window.clone() {
            let reel = self.reels[index].clone();
            if let Some(slot) = self.ensure_player(&reel) {
                self.players[slot.index()].set_tier(window::tier_for(index, target_index));
            }
        }

        // Keep Active unique: anything left bound outside the window goes idle.
        for slot in 0..self.players.len() {
            let outside = match self.players[slot].bound_item() {
                Some(id) => !self.index_of(id).is_some_and(|i| window.contains(&i)),
                None => false,
            };
            if outside && self.players[slot].tier() != Tier::Idle {
                self.players[slot].set_tier(Tier::Idle);
            }
        }

        let Some(slot) = self.bindings.get(to).copied() else {
            return FocusOutcome::Pending;
        };
        let ready_now = self.players[slot.index()].when_ready(to.clone());
        match ready_now {
            Some(target) if self.start_if_focused(slot, &target) => FocusOutcome::Started,
            _ => FocusOutcome::Pending,
        }
    }

    /// Return the Player bound to `reel`, binding one if needed.
    ///
    /// Binds an idle slot or creates a new Player while below capacity;
    /// otherwise rebinds the victim chosen by [`Self::pick_victim`]. `None`
    /// only if a new engine could not be created.
    pub fn ensure_player(&mut self, reel: &Reel) -> Option<SlotId> {
        if let Some(&slot) = self.bindings.get(&reel.id) {
            return Some(slot);
        }

        let slot = if self.bindings.len() < self.pool.capacity {
            match self.players.iter().position(|p| p.bound_item().is_none()) {
                Some(index) => SlotId(index),
                None => self.create_player()?,
            }
        } else {
            let victim = self.pick_victim(reel);
            if let Some(old) = self.players[victim.index()].bound_item().cloned() {
                tracing::debug!("Reusing {} from {} for {}", victim, old, reel.id);
                self.unbind(&old);
            }
            victim
        };

        self.players[slot.index()].configure(reel);
        self.bindings.insert(reel.id.clone(), slot);
        Some(slot)
    }

    /// Choose the Player to rebind for `reel` when the pool is full.
    ///
    /// Players bound outside the window are always preferred. Within the
    /// preferred group the one farthest from `reel`'s index wins; ties go to
    /// the lowest reel index, then the lowest slot. If `reel` is not in the
    /// catalog the lowest bound slot is taken.
    pub fn pick_victim(&self, reel: &Reel) -> SlotId {
        let bound: Vec<(SlotId, Option<usize>)> = self
            .players
            .iter()
            .filter_map(|p| {
                p.bound_item()
                    .map(|id| (p.slot(), self.index_of(id)))
            })
            .collect();
        let first_bound = bound.first().map(|(slot, _)| *slot).unwrap_or(SlotId(0));

        let Some(target) = self.index_of(&reel.id) else {
            return first_bound;
        };

        let window = self.window();
        let in_window = |index: Option<usize>| match (&window, index) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(range), Some(i)) => range.contains(&i),
        };
        let (inside, outside): (Vec<_>, Vec<_>) =
            bound.into_iter().partition(|(_, index)| in_window(*index));

        let group = if outside.is_empty() { inside } else { outside };
        group
            .into_iter()
            .min_by_key(|(slot, index)| {
                let distance = index.map(|i| i.abs_diff(target)).unwrap_or(usize::MAX);
                (Reverse(distance), index.unwrap_or(usize::MAX), *slot)
            })
            .map(|(slot, _)| slot)
            .unwrap_or(first_bound)
    }

    /// Route a marshaled engine notification.
    ///
    /// Returns the reel that started playing, if any.
    pub fn handle_engine_event(&mut self, event: EngineEvent) -> Option<ItemId> {
        let player = self.players.get_mut(event.slot.index())?;
        match event.signal {
            EngineSignal::Ready => {
                let target = player.on_ready(event.generation)?;
                self.start_if_focused(event.slot, &target)
                    .then_some(target)
            }
            EngineSignal::SegmentEnded(segment) => {
                player.on_segment_end(event.generation, segment);
                None
            }
        }
    }

    /// Start `target` unless focus moved on since the intent was registered.
    fn start_if_focused(&mut self, slot: SlotId, target: &ItemId) -> bool {
        if self.focus.focused.as_ref() != Some(target) {
            tracing::debug!("Dropping stale start for {}", target);
            return false;
        }
        self.players[slot.index()].play();
        self.focus.anchor = Some(target.clone());
        tracing::info!("Playing {} on {}", target, slot);
        true
    }

    fn create_player(&mut self) -> Option<SlotId> {
        let slot = SlotId(self.players.len());
        match self.factory.create() {
            Ok(engine) => {
                self.players.push(Player::new(
                    slot,
                    engine,
                    Arc::clone(&self.policy),
                    self.events.clone(),
                ));
                tracing::debug!("Created {}", slot);
                Some(slot)
            }
            Err(e) => {
                tracing::error!("Failed to create media engine: {}", e);
                None
            }
        }
    }

    fn unbind(&mut self, id: &ItemId) -> Option<SlotId> {
        self.bindings.remove(id)
    }
}
