//! Scripted in-memory media engine and pool fixtures.

#![allow(dead_code)]

use reel_pool::settings::PoolSettings;
use reel_pool::{
    EngineError, EngineEvent, EngineFactory, ItemId, MediaEngine, Notifier, PoolCoordinator,
    QualityPolicy, Reel, SegmentId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use url::Url;

/// Everything a fake engine was told, plus its observers.
#[derive(Default)]
pub struct EngineState {
    pub queue: Vec<(SegmentId, Url)>,
    pub playing: bool,
    pub buffer_hints: HashMap<SegmentId, f64>,
    pub bitrate_hints: HashMap<SegmentId, f64>,
    pub on_ready: Option<Notifier>,
    pub on_segment_end: Option<Notifier>,
    pub loads: usize,
    /// Upcoming `append_segment` calls that fail.
    pub failing_appends: usize,
}

impl EngineState {
    pub fn current_source(&self) -> Option<&Url> {
        self.queue.first().map(|(_, url)| url)
    }

    pub fn current_buffer_hint(&self) -> Option<f64> {
        let (segment, _) = self.queue.first()?;
        self.buffer_hints.get(segment).copied()
    }
}

#[derive(Clone)]
pub struct EngineProbe(Arc<Mutex<EngineState>>);

impl EngineProbe {
    pub fn state(&self) -> MutexGuard<'_, EngineState> {
        self.0.lock().unwrap()
    }

    /// Report readiness through whatever observer is registered now.
    pub fn fire_ready(&self) {
        let notifier = self.state().on_ready.clone();
        if let Some(notifier) = notifier {
            notifier.ready();
        }
    }

    /// Finish the current segment the way a real engine would.
    pub fn finish_segment(&self) {
        let (finished, notifier) = {
            let mut state = self.state();
            let finished = state.queue.first().map(|(id, _)| *id);
            if state.queue.len() > 1 {
                state.queue.remove(0);
            }
            (finished, state.on_segment_end.clone())
        };
        if let (Some(finished), Some(notifier)) = (finished, notifier) {
            notifier.segment_ended(finished);
        }
    }

    pub fn queue_len(&self) -> usize {
        self.state().queue.len()
    }
}

pub struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
    next_segment: Arc<AtomicU64>,
}

impl FakeEngine {
    fn allocate(&self) -> SegmentId {
        SegmentId(self.next_segment.fetch_add(1, Ordering::Relaxed))
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap()
    }
}

impl MediaEngine for FakeEngine {
    fn play(&mut self) -> Result<(), EngineError> {
        self.state().playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.state().playing = false;
        Ok(())
    }

    fn replace_segment(&mut self, source: &Url) -> Result<SegmentId, EngineError> {
        let id = self.allocate();
        let mut state = self.state();
        state.queue.clear();
        state.queue.push((id, source.clone()));
        state.playing = false;
        state.loads += 1;
        Ok(id)
    }

    fn append_segment(&mut self, source: &Url) -> Result<SegmentId, EngineError> {
        let id = self.allocate();
        let mut state = self.state();
        if state.failing_appends > 0 {
            state.failing_appends -= 1;
            return Err(EngineError::Backend("append refused".into()));
        }
        state.queue.push((id, source.clone()));
        Ok(id)
    }

    fn remove_segment(&mut self, segment: SegmentId) -> Result<(), EngineError> {
        let mut state = self.state();
        let index = state
            .queue
            .iter()
            .position(|(id, _)| *id == segment)
            .ok_or(EngineError::UnknownSegment(segment.0))?;
        state.queue.remove(index);
        Ok(())
    }

    fn set_buffer_duration_hint(&mut self, segment: SegmentId, seconds: f64) {
        self.state().buffer_hints.insert(segment, seconds);
    }

    fn set_peak_bitrate_hint(&mut self, segment: SegmentId, bits_per_second: f64) {
        self.state().bitrate_hints.insert(segment, bits_per_second);
    }

    fn observe_ready(&mut self, notifier: Notifier) {
        self.state().on_ready = Some(notifier);
    }

    fn observe_segment_end(&mut self, notifier: Notifier) {
        self.state().on_segment_end = Some(notifier);
    }

    fn detach_observers(&mut self) {
        let mut state = self.state();
        state.on_ready = None;
        state.on_segment_end = None;
    }
}

/// Hands out fake engines and keeps a probe for each, in creation order.
#[derive(Clone, Default)]
pub struct FakeFactory {
    engines: Arc<Mutex<Vec<EngineProbe>>>,
    next_segment: Arc<AtomicU64>,
}

impl FakeFactory {
    pub fn created(&self) -> usize {
        self.engines.lock().unwrap().len()
    }

    pub fn probe(&self, index: usize) -> EngineProbe {
        self.engines.lock().unwrap()[index].clone()
    }
}

impl EngineFactory for FakeFactory {
    fn create(&self) -> Result<Box<dyn MediaEngine>, EngineError> {
        let state = Arc::new(Mutex::new(EngineState::default()));
        self.engines
            .lock()
            .unwrap()
            .push(EngineProbe(Arc::clone(&state)));
        Ok(Box::new(FakeEngine {
            state,
            next_segment: Arc::clone(&self.next_segment),
        }))
    }
}

pub fn id(n: usize) -> ItemId {
    ItemId::new(format!("reel-{n}"))
}

pub fn reel(n: usize) -> Reel {
    Reel::with_id(
        id(n),
        Url::parse(&format!("https://cdn.example.com/reels/{n}.m3u8")).unwrap(),
    )
}

pub fn reels(count: usize) -> Vec<Reel> {
    (0..count).map(reel).collect()
}

/// A pool over `count` reels with a fake engine factory.
pub struct Harness {
    pub pool: PoolCoordinator,
    pub factory: FakeFactory,
    pub events: mpsc::UnboundedReceiver<EngineEvent>,
}

impl Harness {
    pub fn new(capacity: usize, ahead: usize, behind: usize, count: usize) -> Self {
        let (pool, factory, events) = pool(capacity, ahead, behind);
        let mut harness = Self {
            pool,
            factory,
            events,
        };
        harness.pool.update_items(reels(count));
        harness
    }

    /// Deliver queued engine notifications. Returns reels that started.
    pub fn pump(&mut self) -> Vec<ItemId> {
        let mut started = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let Some(item) = self.pool.handle_engine_event(event) {
                started.push(item);
            }
        }
        started
    }

    /// Probe of the engine currently bound to reel `n`.
    pub fn engine_for(&self, n: usize) -> EngineProbe {
        let slot = self.pool.player_for(&id(n)).expect("reel is bound").slot();
        self.factory.probe(slot.index())
    }

    pub fn focus(&mut self, from: Option<usize>, to: usize) {
        let from = from.map(id);
        self.pool.set_focus(from.as_ref(), Some(&id(to)));
    }

    pub fn bound_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .pool
            .players()
            .filter_map(|p| p.bound_item())
            .filter_map(|item| self.pool.index_of(item))
            .collect();
        indices.sort_unstable();
        indices
    }
}

pub fn pool(
    capacity: usize,
    ahead: usize,
    behind: usize,
) -> (PoolCoordinator, FakeFactory, mpsc::UnboundedReceiver<EngineEvent>) {
    let factory = FakeFactory::default();
    let (tx, rx) = mpsc::unbounded_channel();
    let pool = PoolCoordinator::new(
        &PoolSettings {
            capacity,
            ahead,
            behind,
        },
        QualityPolicy::default(),
        Box::new(factory.clone()),
        tx,
    )
    .expect("valid pool settings");
    (pool, factory, rx)
}
