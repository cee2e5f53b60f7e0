//! Prefetch window around the focused reel.

use crate::quality::Tier;
use std::ops::RangeInclusive;

/// Contiguous index range to keep resident around `focus_index`.
///
/// `None` when nothing is focused or the feed is empty.
pub fn window_for(
    focus_index: Option<usize>,
    item_count: usize,
    ahead: usize,
    behind: usize,
) -> Option<RangeInclusive<usize>> {
    let focus = focus_index?;
    let last = item_count.checked_sub(1)?;
    let lower = focus.saturating_sub(behind);
    let upper = focus.saturating_add(ahead).min(last);
    Some(lower..=upper)
}

/// Tier of the reel at `slot_index` while `focus_index` is focused.
///
/// Prefetch is asymmetric: two-or-more ahead is `PrefetchFar`, but anything
/// further than one behind stays `Idle`.
pub fn tier_for(slot_index: usize, focus_index: usize) -> Tier {
    if slot_index == focus_index {
        Tier::Active
    } else if slot_index.abs_diff(focus_index) == 1 {
        Tier::Neighbor
    } else if slot_index > focus_index + 1 {
        Tier::PrefetchFar
    } else {
        Tier::Idle
    }
}
