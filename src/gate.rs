//! Readiness gate for focus changes.
//!
//! A user may move focus one slot away from the last reel that actually
//! played even if the target is not ready yet, since it is already buffering
//! as a neighbor. Jumps of two or more slots onto an unready reel are
//! refused so the screen never lands on a completely unprimed Player.

use crate::item::ItemId;
use crate::pool::PoolCoordinator;

/// Furthest an unready target may be from the anchor.
pub const MAX_UNREADY_JUMP: usize = 1;

/// Verdict on an attempted focus change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// No target; the caller must not apply anything.
    Ignore,
    /// Proceed with [`PoolCoordinator::set_focus`].
    Allow,
    /// Refused; the host should snap its focus indicator back to `fallback`.
    Block { fallback: ItemId },
}

/// Decide whether focus may move from `from` to `to`.
///
/// The distance is measured from the last reel confirmed playing, or the
/// current focus if nothing has played yet. Unknown reels are let through.
pub fn evaluate(pool: &PoolCoordinator, from: Option<&ItemId>, to: Option<&ItemId>) -> GateDecision {
    let Some(to) = to else {
        return GateDecision::Ignore;
    };

    let focus = pool.focus();
    let Some(anchor) = focus.anchor.as_ref().or(focus.focused.as_ref()) else {
        return GateDecision::Allow;
    };
    let (Some(anchor_index), Some(target_index)) = (pool.index_of(anchor), pool.index_of(to))
    else {
        return GateDecision::Allow;
    };

    let distance = target_index.abs_diff(anchor_index);
    if distance > MAX_UNREADY_JUMP && !pool.is_ready(to) {
        let fallback = from.unwrap_or(anchor).clone();
        tracing::debug!(
            "Blocking jump to {} ({} slots from {}, not ready); back to {}",
            to,
            distance,
            anchor,
            fallback
        );
        return GateDecision::Block { fallback };
    }

    GateDecision::Allow
}
