//! Host-facing feed: catalog state, gated focus changes and playback controls.

use crate::engine::EngineEvent;
use crate::error::CatalogError;
use crate::gate::{self, GateDecision};
use crate::item::{ItemId, Reel};
use crate::player::{Player, PlayerStatus};
use crate::pool::{FocusOutcome, FocusState, PoolCoordinator};

/// What became of a requested focus change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusChange {
    /// Focus moved to `item`; `playing` if it started right away.
    Applied { item: ItemId, playing: bool },
    /// Refused by the gate; the host should show `fallback` as focused.
    Blocked { fallback: ItemId },
    /// Nothing to do (no target, unknown reel, or already at the feed edge).
    Ignored,
}

/// Copy of the feed state for hosts.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub items: Vec<Reel>,
    pub focus: FocusState,
    pub focus_ready: bool,
    pub loading: bool,
    pub last_error: Option<String>,
    pub players: Vec<PlayerStatus>,
}

pub struct ReelFeed {
    pool: PoolCoordinator,
    loading: bool,
    last_error: Option<String>,
}

impl ReelFeed {
    pub fn new(pool: PoolCoordinator) -> Self {
        Self {
            pool,
            loading: false,
            last_error: None,
        }
    }

    pub fn pool(&self) -> &PoolCoordinator {
        &self.pool
    }

    pub fn items(&self) -> &[Reel] {
        self.pool.items()
    }

    pub fn focused(&self) -> Option<&ItemId> {
        self.pool.focus().focused.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn update_items(&mut self, reels: Vec<Reel>) {
        self.pool.update_items(reels);
    }

    /// Mark a catalog load as started. `false` if one is already running.
    pub fn begin_load(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        true
    }

    /// Apply the result of a catalog fetch.
    ///
    /// A failure keeps the previous reels and the pool untouched. On success
    /// the first reel is focused unless the current focus is still listed.
    pub fn finish_load(&mut self, result: Result<Vec<Reel>, CatalogError>) -> Option<FocusChange> {
        self.loading = false;
        match result {
            Ok(reels) => {
                self.last_error = None;
                self.update_items(reels);
                if self
                    .focused()
                    .is_some_and(|id| self.pool.index_of(id).is_some())
                {
                    return None;
                }
                let first = self.items().first().map(|reel| reel.id.clone())?;
                Some(self.request_focus_change(None, Some(&first)))
            }
            Err(e) => {
                tracing::warn!("Catalog load failed, keeping {} reels: {}", self.items().len(), e);
                self.last_error = Some(e.to_string());
                None
            }
        }
    }

    /// Gate and apply a focus change.
    pub fn request_focus_change(&mut self, from: Option<&ItemId>, to: Option<&ItemId>) -> FocusChange {
        match gate::evaluate(&self.pool, from, to) {
            GateDecision::Ignore => FocusChange::Ignored,
            GateDecision::Block { fallback } => FocusChange::Blocked { fallback },
            GateDecision::Allow => match (self.pool.set_focus(from, to), to) {
                (FocusOutcome::Ignored, _) | (_, None) => FocusChange::Ignored,
                (outcome, Some(item)) => FocusChange::Applied {
                    item: item.clone(),
                    playing: outcome == FocusOutcome::Started,
                },
            },
        }
    }

    /// Scroll focus by `offset` slots from the current one.
    pub fn step_focus(&mut self, offset: isize) -> FocusChange {
        let count = self.items().len();
        if count == 0 {
            return FocusChange::Ignored;
        }
        let from = self.focused().cloned();
        let current = from
            .as_ref()
            .and_then(|id| self.pool.index_of(id))
            .unwrap_or(0);
        let target = current.saturating_add_signed(offset).min(count - 1);
        if from.is_some() && target == current {
            return FocusChange::Ignored;
        }
        let to = self.items()[target].id.clone();
        self.request_focus_change(from.as_ref(), Some(&to))
    }

    pub fn player_for(&self, id: &ItemId) -> Option<&Player> {
        self.pool.player_for(id)
    }

    pub fn is_focus_ready(&self) -> bool {
        self.pool.is_focus_ready()
    }

    pub fn toggle_like(&mut self, id: &ItemId) -> Option<bool> {
        self.pool.toggle_like(id)
    }

    /// Tap on a reel: pause if playing, play otherwise.
    ///
    /// Taps on a Player that is still buffering are ignored.
    pub fn toggle_playback(&mut self, id: &ItemId) -> Option<bool> {
        let player = self.pool.player_for_mut(id)?;
        if player.is_playing() {
            player.pause();
        } else if player.is_ready() {
            player.play();
        }
        Some(player.is_playing())
    }

    /// Hold playback while the host overlays input on a reel, resume after.
    pub fn hold_playback(&mut self, id: &ItemId, held: bool) {
        let Some(player) = self.pool.player_for_mut(id) else {
            return;
        };
        if held {
            player.pause();
        } else if player.is_ready() {
            player.play();
        }
    }

    /// Route an engine notification. Returns the reel that started playing.
    pub fn handle_engine_event(&mut self, event: EngineEvent) -> Option<ItemId> {
        self.pool.handle_engine_event(event)
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            items: self.items().to_vec(),
            focus: self.pool.focus().clone(),
            focus_ready: self.is_focus_ready(),
            loading: self.loading,
            last_error: self.last_error.clone(),
            players: self.pool.players().map(Player::status).collect(),
        }
    }
}
