//! GStreamer `playbin` media engine.
//!
//! Each engine wraps one `playbin`. The segment queue lives beside it: the
//! front entry is the uri currently loaded, and `about-to-finish` swaps in
//! the next queued uri so loops play back to back without a decode gap. A
//! lone segment that reaches end-of-stream is seeked back to the start.
//! Bus messages are handled on GStreamer's own threads and only ever
//! forwarded through a [`Notifier`].

use crate::engine::{EngineFactory, MediaEngine, Notifier, SegmentId};
use crate::error::EngineError;
use gstreamer as gst;
use gstreamer::prelude::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

#[derive(Debug, Clone)]
struct QueuedSegment {
    id: SegmentId,
    uri: String,
    buffer_seconds: Option<f64>,
    peak_bitrate: Option<f64>,
}

/// State shared with GStreamer callbacks.
#[derive(Default)]
struct Shared {
    queue: VecDeque<QueuedSegment>,
    on_ready: Option<Notifier>,
    on_segment_end: Option<Notifier>,
}

impl From<gst::StateChangeError> for EngineError {
    fn from(e: gst::StateChangeError) -> Self {
        EngineError::Backend(format!("state change failed: {e}"))
    }
}

/// Media engine driving one `playbin` pipeline.
pub struct PlaybinEngine {
    playbin: gst::Element,
    shared: Arc<Mutex<Shared>>,
    next_segment: Arc<AtomicU64>,
}

impl PlaybinEngine {
    fn new(next_segment: Arc<AtomicU64>) -> Result<Self, EngineError> {
        let playbin = gst::ElementFactory::make("playbin")
            .build()
            .map_err(|e| EngineError::Backend(format!("Failed to create playbin: {e}")))?;
        let shared = Arc::new(Mutex::new(Shared::default()));

        // Gapless loop: hand playbin the next queued uri before this one ends.
        let shared_weak = Arc::downgrade(&shared);
        let playbin_weak = playbin.downgrade();
        playbin.connect("about-to-finish", false, move |_| {
            let (Some(shared), Some(playbin)) = (shared_weak.upgrade(), playbin_weak.upgrade())
            else {
                return None;
            };
            let (finished, next, notifier) = {
                let Ok(mut guard) = shared.lock() else {
                    return None;
                };
                if guard.queue.len() < 2 {
                    return None;
                }
                let finished = guard.queue.pop_front()?;
                (finished, guard.queue.front().cloned(), guard.on_segment_end.clone())
            };
            if let Some(next) = next {
                playbin.set_property("uri", next.uri.as_str());
                apply_hints(&playbin, &next);
            }
            if let Some(notifier) = notifier {
                notifier.segment_ended(finished.id);
            }
            None
        });

        let bus = playbin
            .bus()
            .ok_or_else(|| EngineError::Backend("playbin has no bus".into()))?;
        let shared_weak = Arc::downgrade(&shared);
        let playbin_weak = playbin.downgrade();
        bus.set_sync_handler(move |_bus, msg| {
            match msg.view() {
                // Preroll finished: the current segment can start without stalling.
                gst::MessageView::AsyncDone(_) => {
                    let notifier = shared_weak
                        .upgrade()
                        .and_then(|shared| shared.lock().ok().and_then(|g| g.on_ready.clone()));
                    if let Some(notifier) = notifier {
                        notifier.ready();
                    }
                }
                // Nothing was queued behind the current segment, so
                // about-to-finish could not advance: replay it from the start.
                gst::MessageView::Eos(_) => {
                    let lone = shared_weak.upgrade().and_then(|shared| {
                        let guard = shared.lock().ok()?;
                        let lone = match (guard.queue.len(), guard.queue.front()) {
                            (1, Some(current)) => Some((current.id, guard.on_segment_end.clone())),
                            _ => None,
                        };
                        lone
                    });
                    if let Some((segment, notifier)) = lone {
                        if let Some(playbin) = playbin_weak.upgrade() {
                            playbin.call_async(|playbin| {
                                if let Err(e) = playbin.seek_simple(
                                    gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT,
                                    gst::ClockTime::ZERO,
                                ) {
                                    tracing::warn!("Failed to restart segment: {}", e);
                                }
                            });
                        }
                        if let Some(notifier) = notifier {
                            notifier.segment_ended(segment);
                        }
                    }
                }
                gst::MessageView::Error(err) => {
                    tracing::error!("GStreamer error: {} ({:?})", err.error(), err.debug());
                }
                _ => {}
            }
            gst::BusSyncReply::Drop
        });

        Ok(Self {
            playbin,
            shared,
            next_segment,
        })
    }

    fn allocate(&self) -> SegmentId {
        SegmentId(self.next_segment.fetch_add(1, Ordering::Relaxed))
    }

    fn with_shared<T>(&self, f: impl FnOnce(&mut Shared) -> T) -> Result<T, EngineError> {
        let mut guard = self
            .shared
            .lock()
            .map_err(|_| EngineError::Backend("engine state poisoned".into()))?;
        Ok(f(&mut guard))
    }

    fn is_prerolled(&self) -> bool {
        let (_, current, pending) = self.playbin.state(gst::ClockTime::ZERO);
        matches!(current, gst::State::Paused | gst::State::Playing)
            && pending == gst::State::VoidPending
    }

    /// Update a queued segment's hints; push them to playbin if it is current.
    fn update_hints(&mut self, segment: SegmentId, f: impl FnOnce(&mut QueuedSegment)) {
        let current = self.with_shared(|shared| {
            let index = shared.queue.iter().position(|s| s.id == segment)?;
            f(&mut shared.queue[index]);
            (index == 0).then(|| shared.queue[0].clone())
        });
        if let Ok(Some(current)) = current {
            apply_hints(&self.playbin, &current);
        }
    }
}

fn apply_hints(playbin: &gst::Element, segment: &QueuedSegment) {
    if let Some(seconds) = segment.buffer_seconds {
        let nanos = (seconds.max(0.0) * 1_000_000_000.0) as i64;
        playbin.set_property("buffer-duration", nanos);
    }
    if let Some(bps) = segment.peak_bitrate {
        // playbin takes kbps; 0 means unknown, i.e. no cap.
        playbin.set_property("connection-speed", (bps.max(0.0) / 1000.0) as u64);
    }
}

impl MediaEngine for PlaybinEngine {
    fn play(&mut self) -> Result<(), EngineError> {
        self.playbin.set_state(gst::State::Playing)?;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.playbin.set_state(gst::State::Paused)?;
        Ok(())
    }

    fn replace_segment(&mut self, source: &Url) -> Result<SegmentId, EngineError> {
        let segment = QueuedSegment {
            id: self.allocate(),
            uri: source.to_string(),
            buffer_seconds: None,
            peak_bitrate: None,
        };
        let id = segment.id;
        self.with_shared(|shared| {
            shared.queue.clear();
            shared.queue.push_back(segment);
        })?;

        // Never hold the lock here: state changes can post AsyncDone inline.
        self.playbin.set_state(gst::State::Null)?;
        self.playbin.set_property("uri", source.as_str());
        self.playbin.set_state(gst::State::Paused)?;
        tracing::debug!("playbin loading {}", source);
        Ok(id)
    }

    fn append_segment(&mut self, source: &Url) -> Result<SegmentId, EngineError> {
        let id = self.allocate();
        self.with_shared(|shared| {
            shared.queue.push_back(QueuedSegment {
                id,
                uri: source.to_string(),
                buffer_seconds: None,
                peak_bitrate: None,
            })
        })?;
        Ok(id)
    }

    fn remove_segment(&mut self, segment: SegmentId) -> Result<(), EngineError> {
        self.with_shared(|shared| {
            match shared.queue.iter().position(|s| s.id == segment) {
                // The current segment stays loaded until replaced.
                Some(0) => Ok(()),
                Some(index) => {
                    shared.queue.remove(index);
                    Ok(())
                }
                None => Err(EngineError::UnknownSegment(segment.0)),
            }
        })?
    }

    fn set_buffer_duration_hint(&mut self, segment: SegmentId, seconds: f64) {
        self.update_hints(segment, |s| s.buffer_seconds = Some(seconds));
    }

    fn set_peak_bitrate_hint(&mut self, segment: SegmentId, bits_per_second: f64) {
        self.update_hints(segment, |s| s.peak_bitrate = Some(bits_per_second));
    }

    fn observe_ready(&mut self, notifier: Notifier) {
        let immediate = notifier.clone();
        if self.with_shared(|shared| shared.on_ready = Some(notifier)).is_ok()
            && self.is_prerolled()
        {
            immediate.ready();
        }
    }

    fn observe_segment_end(&mut self, notifier: Notifier) {
        let _ = self.with_shared(|shared| shared.on_segment_end = Some(notifier));
    }

    fn detach_observers(&mut self) {
        let _ = self.with_shared(|shared| {
            shared.on_ready = None;
            shared.on_segment_end = None;
        });
    }
}

impl Drop for PlaybinEngine {
    fn drop(&mut self) {
        if let Some(bus) = self.playbin.bus() {
            bus.unset_sync_handler();
        }
        let _ = self.playbin.set_state(gst::State::Null);
    }
}

/// Creates one [`PlaybinEngine`] per Player.
pub struct PlaybinFactory {
    next_segment: Arc<AtomicU64>,
}

impl PlaybinFactory {
    /// Initialize GStreamer (once per process) and check that `playbin` exists.
    pub fn new() -> Result<Self, EngineError> {
        gst::init().map_err(|e| EngineError::Backend(format!("Failed to initialize GStreamer: {e}")))?;
        tracing::info!("GStreamer initialized: {}", gst::version_string());
        if gst::ElementFactory::find("playbin").is_none() {
            return Err(EngineError::Backend("playbin element not available".into()));
        }
        Ok(Self {
            next_segment: Arc::new(AtomicU64::new(1)),
        })
    }
}

impl EngineFactory for PlaybinFactory {
    fn create(&self) -> Result<Box<dyn MediaEngine>, EngineError> {
        Ok(Box::new(PlaybinEngine::new(Arc::clone(&self.next_segment))?))
    }
}
