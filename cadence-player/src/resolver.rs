//! Track resolution seam
//!
//! The catalog service (search, stream URL extraction) lives outside this
//! crate. The coordinator only needs two lookups: free-text query for fresh
//! requests, and stable-id lookup for the lazy re-resolution of items that
//! were restored from the database without a stream locator.

use crate::error::Result;
use async_trait::async_trait;
use cadence_common::{PlayableItem, PrincipalId, StreamLocator};

/// A catalog hit carrying a fresh, short-lived stream locator.
#[derive(Debug, Clone)]
pub struct ResolvedTrack {
    pub stable_id: Option<String>,
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration: Option<u64>,
    pub uploader: Option<String>,
    pub locator: StreamLocator,
}

impl ResolvedTrack {
    /// Attach the requesting principal, producing a queueable item.
    pub fn into_item(self, requester: PrincipalId) -> PlayableItem {
        PlayableItem {
            stable_id: self.stable_id,
            title: self.title,
            thumbnail: self.thumbnail,
            duration: self.duration,
            uploader: self.uploader,
            requester,
            locator: Some(self.locator),
        }
    }
}

/// External catalog interface.
///
/// `Ok(None)` means "nothing found" (a normal outcome); `Err` means the
/// lookup itself failed. Implementations run network I/O and must not assume
/// they are called from any particular tenant's context.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resolve a free-text query or URL to the best matching track.
    async fn resolve(&self, query: &str) -> Result<Option<ResolvedTrack>>;

    /// Re-resolve a known item by its stable identifier, yielding a fresh
    /// stream locator. Used for items restored from persistence.
    async fn resolve_by_id(&self, stable_id: &str) -> Result<Option<ResolvedTrack>>;
}
