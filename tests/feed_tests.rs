//! Host-facing feed and its owner task.

mod support;

use async_trait::async_trait;
use reel_pool::{
    spawn_feed, CatalogError, CatalogSource, EngineEvent, FeedEvent, FocusChange, Reel, ReelFeed,
};
use std::sync::Arc;
use std::time::Duration;
use support::{id, reels, FakeFactory};
use tokio::sync::mpsc;

fn decode_error() -> CatalogError {
    CatalogError::Decode(serde_json::from_str::<serde_json::Value>("{").unwrap_err())
}

struct FeedRig {
    feed: ReelFeed,
    factory: FakeFactory,
    events: mpsc::UnboundedReceiver<EngineEvent>,
}

impl FeedRig {
    fn new() -> Self {
        let (pool, factory, events) = support::pool(5, 2, 2);
        Self {
            feed: ReelFeed::new(pool),
            factory,
            events,
        }
    }

    fn loaded(count: usize) -> Self {
        let mut rig = Self::new();
        assert!(rig.feed.begin_load());
        rig.feed.finish_load(Ok(reels(count)));
        rig
    }

    fn ready(&mut self, n: usize) -> Vec<reel_pool::ItemId> {
        let slot = self.feed.player_for(&id(n)).unwrap().slot();
        self.factory.probe(slot.index()).fire_ready();
        let mut started = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            started.extend(self.feed.handle_engine_event(event));
        }
        started
    }
}

#[test]
fn first_load_focuses_the_first_reel() {
    let mut rig = FeedRig::new();
    assert!(rig.feed.begin_load());
    assert!(rig.feed.is_loading());

    let change = rig.feed.finish_load(Ok(reels(4)));
    assert_eq!(
        change,
        Some(FocusChange::Applied {
            item: id(0),
            playing: false
        })
    );
    assert!(!rig.feed.is_loading());
    assert_eq!(rig.feed.focused(), Some(&id(0)));

    // Later loads keep the current focus.
    rig.feed.begin_load();
    assert_eq!(rig.feed.finish_load(Ok(reels(6))), None);
    assert_eq!(rig.feed.items().len(), 6);
    assert_eq!(rig.feed.focused(), Some(&id(0)));
}

#[test]
fn reload_with_new_ids_refocuses_the_first_reel() {
    let mut rig = FeedRig::loaded(4);
    rig.ready(0);
    assert!(rig.feed.is_focus_ready());

    // Same videos, freshly minted ids.
    let fresh: Vec<Reel> = reels(4)
        .into_iter()
        .map(|reel| Reel::new(reel.source))
        .collect();
    let first = fresh[0].id.clone();

    rig.feed.begin_load();
    let change = rig.feed.finish_load(Ok(fresh));

    // The released Player still holds the prerolled video, so it starts at once.
    assert_eq!(
        change,
        Some(FocusChange::Applied {
            item: first.clone(),
            playing: true
        })
    );
    assert_eq!(rig.feed.focused(), Some(&first));
    assert!(rig.feed.is_focus_ready());
    assert_eq!(rig.feed.pool().focus().anchor, Some(first.clone()));

    let playing = (0..rig.factory.created())
        .filter(|&i| rig.factory.probe(i).state().playing)
        .count();
    assert_eq!(playing, 1);
}

#[test]
fn tap_on_a_buffering_reel_is_ignored() {
    let mut rig = FeedRig::loaded(5);
    assert!(!rig.feed.player_for(&id(0)).unwrap().is_ready());

    assert_eq!(rig.feed.toggle_playback(&id(0)), Some(false));
    rig.feed.hold_playback(&id(0), false);
    assert!(!rig.feed.player_for(&id(0)).unwrap().is_playing());

    let slot = rig.feed.player_for(&id(0)).unwrap().slot();
    assert!(!rig.factory.probe(slot.index()).state().playing);
}

#[test]
fn failed_load_keeps_the_previous_reels() {
    let mut rig = FeedRig::loaded(4);
    let bound = rig.feed.pool().bound_count();

    assert!(rig.feed.begin_load());
    assert_eq!(rig.feed.finish_load(Err(decode_error())), None);
    assert_eq!(rig.feed.items().len(), 4);
    assert_eq!(rig.feed.pool().bound_count(), bound);
    assert!(rig.feed.last_error().is_some());
    assert!(!rig.feed.is_loading());

    rig.feed.begin_load();
    rig.feed.finish_load(Ok(reels(4)));
    assert_eq!(rig.feed.last_error(), None);
}

#[test]
fn only_one_load_runs_at_a_time() {
    let mut rig = FeedRig::new();
    assert!(rig.feed.begin_load());
    assert!(!rig.feed.begin_load());
    rig.feed.finish_load(Ok(Vec::new()));
    assert!(rig.feed.begin_load());
}

#[test]
fn empty_catalog_has_nothing_to_focus() {
    let mut rig = FeedRig::loaded(0);
    assert_eq!(rig.feed.focused(), None);
    assert_eq!(rig.feed.step_focus(1), FocusChange::Ignored);
}

#[test]
fn stepping_moves_one_reel_and_stops_at_the_edges() {
    let mut rig = FeedRig::loaded(3);
    assert_eq!(rig.feed.step_focus(-1), FocusChange::Ignored);

    assert_eq!(
        rig.feed.step_focus(1),
        FocusChange::Applied {
            item: id(1),
            playing: false
        }
    );
    rig.ready(1);
    assert_eq!(
        rig.feed.step_focus(1),
        FocusChange::Applied {
            item: id(2),
            playing: false
        }
    );
    assert_eq!(rig.feed.step_focus(1), FocusChange::Ignored);
    assert_eq!(rig.feed.focused(), Some(&id(2)));
}

#[test]
fn blocked_jump_leaves_focus_in_place() {
    let mut rig = FeedRig::loaded(10);
    assert_eq!(rig.ready(0), vec![id(0)]);

    let change = rig.feed.request_focus_change(Some(&id(0)), Some(&id(5)));
    assert_eq!(change, FocusChange::Blocked { fallback: id(0) });
    assert_eq!(rig.feed.focused(), Some(&id(0)));
    assert!(rig.feed.is_focus_ready());
}

#[test]
fn ready_neighbor_starts_as_soon_as_it_is_focused() {
    let mut rig = FeedRig::loaded(10);
    rig.ready(0);
    assert!(rig.ready(1).is_empty());

    assert_eq!(
        rig.feed.request_focus_change(Some(&id(0)), Some(&id(1))),
        FocusChange::Applied {
            item: id(1),
            playing: true
        }
    );
    assert!(!rig.feed.player_for(&id(0)).unwrap().is_playing());
}

#[test]
fn tap_and_hold_control_playback() {
    let mut rig = FeedRig::loaded(5);
    rig.ready(0);
    assert!(rig.feed.player_for(&id(0)).unwrap().is_playing());

    assert_eq!(rig.feed.toggle_playback(&id(0)), Some(false));
    assert_eq!(rig.feed.toggle_playback(&id(0)), Some(true));
    assert_eq!(rig.feed.toggle_playback(&id(9)), None);

    rig.feed.hold_playback(&id(0), true);
    assert!(!rig.feed.player_for(&id(0)).unwrap().is_playing());
    rig.feed.hold_playback(&id(0), false);
    assert!(rig.feed.player_for(&id(0)).unwrap().is_playing());
}

#[test]
fn snapshot_reflects_the_feed() {
    let mut rig = FeedRig::loaded(5);
    rig.feed.toggle_like(&id(2));
    rig.ready(0);

    let snapshot = rig.feed.snapshot();
    assert_eq!(snapshot.items.len(), 5);
    assert!(snapshot.items[2].liked);
    assert_eq!(snapshot.focus.focused, Some(id(0)));
    assert_eq!(snapshot.focus.anchor, Some(id(0)));
    assert!(snapshot.focus_ready);
    assert!(!snapshot.loading);
    assert_eq!(snapshot.players.len(), 3);
}

struct StaticCatalog(Vec<Reel>);

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch_items(&self) -> Result<Vec<Reel>, CatalogError> {
        Ok(self.0.clone())
    }
}

struct BrokenCatalog;

#[async_trait]
impl CatalogSource for BrokenCatalog {
    async fn fetch_items(&self) -> Result<Vec<Reel>, CatalogError> {
        Err(decode_error())
    }
}

async fn next_event(events: &mut mpsc::Receiver<FeedEvent>) -> Option<FeedEvent> {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("feed event in time")
}

#[tokio::test]
async fn service_loads_and_starts_the_first_reel() {
    let (pool, factory, engine_events) = support::pool(5, 2, 2);
    let (handle, mut events) = spawn_feed(
        ReelFeed::new(pool),
        engine_events,
        Arc::new(StaticCatalog(reels(6))),
    );

    handle.reload().await.unwrap();
    assert_eq!(
        next_event(&mut events).await,
        Some(FeedEvent::CatalogLoaded { count: 6 })
    );

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.items.len(), 6);
    assert_eq!(snapshot.focus.focused, Some(id(0)));
    assert!(!snapshot.focus_ready);

    factory.probe(0).fire_ready();
    assert_eq!(
        next_event(&mut events).await,
        Some(FeedEvent::FocusStarted(id(0)))
    );
    assert!(handle.is_focus_ready().await.unwrap());

    assert_eq!(
        handle.step_focus(1).await.unwrap(),
        FocusChange::Applied {
            item: id(1),
            playing: false
        }
    );
    let status = handle.player_status(id(1)).await.unwrap().unwrap();
    assert_eq!(status.tier, reel_pool::Tier::Active);

    assert_eq!(
        handle
            .request_focus_change(Some(id(1)), Some(id(5)))
            .await
            .unwrap(),
        FocusChange::Blocked { fallback: id(1) }
    );
    assert_eq!(handle.toggle_like(id(2)).await.unwrap(), Some(true));
}

#[tokio::test]
async fn service_reports_failed_loads_and_stops_with_its_handles() {
    let (pool, _factory, engine_events) = support::pool(5, 2, 2);
    let (handle, mut events) = spawn_feed(ReelFeed::new(pool), engine_events, Arc::new(BrokenCatalog));

    handle.reload().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        Some(FeedEvent::CatalogFailed(_))
    ));

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.items.is_empty());
    assert!(snapshot.last_error.is_some());
    assert!(!snapshot.loading);

    drop(handle);
    assert_eq!(next_event(&mut events).await, None);
}
