use anyhow::{Context, Result};
use reel_pool::engine::playbin::PlaybinFactory;
use reel_pool::{spawn_feed, FeedEvent, FocusChange, HttpCatalog, PoolCoordinator, ReelFeed, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,reel_pool=debug")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("REEL_POOL_CONFIG").map(PathBuf::from));
    let settings = Settings::load(config_path.as_deref()).context("Failed to load settings")?;

    let factory = PlaybinFactory::new().context("Failed to set up video playback")?;
    let (engine_tx, engine_rx) = mpsc::unbounded_channel();
    let pool = PoolCoordinator::new(
        &settings.pool,
        settings.quality.clone(),
        Box::new(factory),
        engine_tx,
    )?;
    let catalog = Arc::new(HttpCatalog::new(&settings.catalog).context("Invalid catalog settings")?);
    tracing::info!("Catalog: {}", catalog.manifest_url());

    let (feed, mut events) = spawn_feed(ReelFeed::new(pool), engine_rx, catalog);
    feed.reload().await?;

    let mut advance = tokio::time::interval(Duration::from_secs(settings.autoplay.advance_secs.max(1)));
    advance.tick().await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutting down");
                break;
            }
            Some(event) = events.recv() => match event {
                FeedEvent::CatalogLoaded { count } => tracing::info!("Catalog loaded: {} reels", count),
                FeedEvent::CatalogFailed(e) => tracing::warn!("Catalog unavailable: {}", e),
                FeedEvent::FocusStarted(item) => tracing::info!("Now playing {}", item),
            },
            _ = advance.tick() => match feed.step_focus(1).await? {
                FocusChange::Applied { item, .. } => tracing::debug!("Advanced to {}", item),
                FocusChange::Blocked { fallback } => {
                    tracing::debug!("Next reel not ready, staying on {}", fallback);
                }
                FocusChange::Ignored => tracing::debug!("End of feed"),
            },
        }
    }

    Ok(())
}
