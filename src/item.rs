//! Feed items ("reels") and their identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Stable identity of a reel. Two reels are the same item iff their ids match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One unit of content in the scrollable feed.
///
/// The source URI may repeat across reels and `liked` changes independently,
/// so nothing in the pool compares reels structurally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reel {
    pub id: ItemId,
    pub source: Url,
    #[serde(default)]
    pub liked: bool,
}

impl Reel {
    /// Create a reel with a freshly minted id.
    pub fn new(source: Url) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), source)
    }

    /// Create a reel with a host-provided id.
    pub fn with_id(id: impl Into<ItemId>, source: Url) -> Self {
        Self {
            id: id.into(),
            source,
            liked: false,
        }
    }
}
