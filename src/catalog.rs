//! Catalog sources producing the ordered reel list.

use crate::error::CatalogError;
use crate::item::Reel;
use crate::settings::CatalogSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

/// Produces the ordered item list for the feed.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_items(&self) -> Result<Vec<Reel>, CatalogError>;
}

/// Manifest published next to the videos on the CDN.
#[derive(Debug, Deserialize)]
struct Manifest {
    videos: Vec<String>,
}

/// Catalog backed by a JSON manifest over HTTP.
pub struct HttpCatalog {
    client: Client,
    manifest_url: Url,
}

impl HttpCatalog {
    pub fn new(settings: &CatalogSettings) -> Result<Self, CatalogError> {
        let manifest_url = Url::parse(&settings.manifest_url)?;
        let client = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self {
            client,
            manifest_url,
        })
    }

    pub fn manifest_url(&self) -> &Url {
        &self.manifest_url
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    async fn fetch_items(&self) -> Result<Vec<Reel>, CatalogError> {
        tracing::debug!("Fetching catalog from {}", self.manifest_url);
        let res = self
            .client
            .get(self.manifest_url.clone())
            .send()
            .await?
            .error_for_status()?;
        let body = res.bytes().await?;
        let reels = parse_manifest(&body)?;
        tracing::info!("Fetched {} reels", reels.len());
        Ok(reels)
    }
}

/// Decode a manifest into reels with fresh ids, skipping unusable URIs.
pub fn parse_manifest(body: &[u8]) -> Result<Vec<Reel>, CatalogError> {
    let manifest: Manifest = serde_json::from_slice(body)?;
    let reels = manifest
        .videos
        .iter()
        .filter_map(|video| match Url::parse(video) {
            Ok(source) => Some(Reel::new(source)),
            Err(e) => {
                tracing::warn!("Skipping reel with bad URL {:?}: {}", video, e);
                None
            }
        })
        .collect();
    Ok(reels)
}
