//! Owner task for the feed.
//!
//! One tokio task owns the [`ReelFeed`] and serializes everything that
//! touches it: host commands, engine notifications and catalog results.
//! Hosts talk to it through a cloneable [`FeedHandle`].

use crate::catalog::CatalogSource;
use crate::engine::EngineEvent;
use crate::error::{CatalogError, ServiceError};
use crate::feed::{FeedSnapshot, FocusChange, ReelFeed};
use crate::item::{ItemId, Reel};
use crate::player::PlayerStatus;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Notifications from the feed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    CatalogLoaded { count: usize },
    CatalogFailed(String),
    /// A focused reel became ready and is playing.
    FocusStarted(ItemId),
}

enum FeedCommand {
    Reload,
    UpdateItems(Vec<Reel>),
    RequestFocus {
        from: Option<ItemId>,
        to: Option<ItemId>,
        reply: oneshot::Sender<FocusChange>,
    },
    StepFocus {
        offset: isize,
        reply: oneshot::Sender<FocusChange>,
    },
    IsFocusReady(oneshot::Sender<bool>),
    Status {
        item: ItemId,
        reply: oneshot::Sender<Option<PlayerStatus>>,
    },
    ToggleLike {
        item: ItemId,
        reply: oneshot::Sender<Option<bool>>,
    },
    TogglePlayback {
        item: ItemId,
        reply: oneshot::Sender<Option<bool>>,
    },
    HoldPlayback {
        item: ItemId,
        held: bool,
    },
    Snapshot(oneshot::Sender<FeedSnapshot>),
}

/// Cloneable handle to the feed task.
#[derive(Clone)]
pub struct FeedHandle {
    tx: mpsc::Sender<FeedCommand>,
}

impl FeedHandle {
    /// Start a catalog fetch unless one is already running.
    pub async fn reload(&self) -> Result<(), ServiceError> {
        self.send(FeedCommand::Reload).await
    }

    pub async fn update_items(&self, reels: Vec<Reel>) -> Result<(), ServiceError> {
        self.send(FeedCommand::UpdateItems(reels)).await
    }

    pub async fn request_focus_change(
        &self,
        from: Option<ItemId>,
        to: Option<ItemId>,
    ) -> Result<FocusChange, ServiceError> {
        self.ask(|reply| FeedCommand::RequestFocus { from, to, reply })
            .await
    }

    pub async fn step_focus(&self, offset: isize) -> Result<FocusChange, ServiceError> {
        self.ask(|reply| FeedCommand::StepFocus { offset, reply }).await
    }

    pub async fn is_focus_ready(&self) -> Result<bool, ServiceError> {
        self.ask(FeedCommand::IsFocusReady).await
    }

    pub async fn player_status(&self, item: ItemId) -> Result<Option<PlayerStatus>, ServiceError> {
        self.ask(|reply| FeedCommand::Status { item, reply })
            .await
    }

    pub async fn toggle_like(&self, item: ItemId) -> Result<Option<bool>, ServiceError> {
        self.ask(|reply| FeedCommand::ToggleLike { item, reply }).await
    }

    pub async fn toggle_playback(&self, item: ItemId) -> Result<Option<bool>, ServiceError> {
        self.ask(|reply| FeedCommand::TogglePlayback { item, reply })
            .await
    }

    pub async fn hold_playback(&self, item: ItemId, held: bool) -> Result<(), ServiceError> {
        self.send(FeedCommand::HoldPlayback { item, held }).await
    }

    pub async fn snapshot(&self) -> Result<FeedSnapshot, ServiceError> {
        self.ask(FeedCommand::Snapshot).await
    }

    async fn send(&self, command: FeedCommand) -> Result<(), ServiceError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ServiceError::Closed)
    }

    async fn ask<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> FeedCommand,
    ) -> Result<T, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(command(reply)).await?;
        rx.await.map_err(|_| ServiceError::Closed)
    }
}

/// Spawn the feed task.
///
/// `engine_events` must be the receiving end of the channel the pool was
/// built with. The task stops once every [`FeedHandle`] is dropped.
pub fn spawn_feed(
    feed: ReelFeed,
    mut engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    catalog: Arc<dyn CatalogSource>,
) -> (FeedHandle, mpsc::Receiver<FeedEvent>) {
    let (tx, mut commands) = mpsc::channel(64);
    let (event_tx, event_rx) = mpsc::channel(100);
    let (fetch_tx, mut fetches) = mpsc::channel(4);

    let mut actor = FeedActor {
        feed,
        catalog,
        fetch_tx,
        event_tx,
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => actor.handle_command(command),
                    None => break,
                },
                Some(event) = engine_events.recv() => {
                    if let Some(item) = actor.feed.handle_engine_event(event) {
                        actor.emit(FeedEvent::FocusStarted(item));
                    }
                }
                Some(result) = fetches.recv() => actor.finish_load(result),
            }
        }
        tracing::debug!("Feed task stopped");
    });

    (FeedHandle { tx }, event_rx)
}

struct FeedActor {
    feed: ReelFeed,
    catalog: Arc<dyn CatalogSource>,
    fetch_tx: mpsc::Sender<Result<Vec<Reel>, CatalogError>>,
    event_tx: mpsc::Sender<FeedEvent>,
}

impl FeedActor {
    fn handle_command(&mut self, command: FeedCommand) {
        match command {
            FeedCommand::Reload => self.start_load(),
            FeedCommand::UpdateItems(reels) => self.feed.update_items(reels),
            FeedCommand::RequestFocus { from, to, reply } => {
                let change = self.feed.request_focus_change(from.as_ref(), to.as_ref());
                self.report(&change);
                let _ = reply.send(change);
            }
            FeedCommand::StepFocus { offset, reply } => {
                let change = self.feed.step_focus(offset);
                self.report(&change);
                let _ = reply.send(change);
            }
            FeedCommand::IsFocusReady(reply) => {
                let _ = reply.send(self.feed.is_focus_ready());
            }
            FeedCommand::Status { item, reply } => {
                let _ = reply.send(self.feed.player_for(&item).map(|p| p.status()));
            }
            FeedCommand::ToggleLike { item, reply } => {
                let _ = reply.send(self.feed.toggle_like(&item));
            }
            FeedCommand::TogglePlayback { item, reply } => {
                let _ = reply.send(self.feed.toggle_playback(&item));
            }
            FeedCommand::HoldPlayback { item, held } => self.feed.hold_playback(&item, held),
            FeedCommand::Snapshot(reply) => {
                let _ = reply.send(self.feed.snapshot());
            }
        }
    }

    fn start_load(&mut self) {
        if !self.feed.begin_load() {
            tracing::debug!("Catalog load already in progress");
            return;
        }
        let catalog = Arc::clone(&self.catalog);
        let tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let result = catalog.fetch_items().await;
            let _ = tx.send(result).await;
        });
    }

    fn finish_load(&mut self, result: Result<Vec<Reel>, CatalogError>) {
        let event = match &result {
            Ok(reels) => FeedEvent::CatalogLoaded { count: reels.len() },
            Err(e) => FeedEvent::CatalogFailed(e.to_string()),
        };
        let change = self.feed.finish_load(result);
        self.emit(event);
        if let Some(change) = change {
            self.report(&change);
        }
    }

    fn report(&self, change: &FocusChange) {
        if let FocusChange::Applied {
            item,
            playing: true,
        } = change
        {
            self.emit(FeedEvent::FocusStarted(item.clone()));
        }
    }

    /// Never blocks the owner; events are dropped if the host stops listening.
    fn emit(&self, event: FeedEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.event_tx.try_send(event) {
            tracing::warn!("Feed event channel full, dropping {:?}", event);
        }
    }
}
