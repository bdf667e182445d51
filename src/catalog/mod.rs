//! The remote music catalog as seen by the rest of the crate.
//!
//! Collectors, the feature assembler and the playlist synchronizer only talk
//! to a [`CatalogApi`]; `SpotifyClient` is the production implementation.

use async_trait::async_trait;

use crate::error::Result;

#[cfg(test)]
pub mod mock;
pub mod models;

pub use models::{AudioFeatures, PlaylistSnapshot, PlaylistSummary, Track, FEATURE_NAMES};

/// One page of an offset/limit paged listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Size of the whole collection as reported by the server.
    pub total: u32,
}

#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Id of the authenticated user.
    fn user_id(&self) -> &str;

    async fn saved_tracks_page(&self, limit: u32, offset: u32) -> Result<Page<Track>>;

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Page<Track>>;

    async fn user_playlists_page(&self, limit: u32, offset: u32) -> Result<Page<PlaylistSummary>>;

    /// Features for an explicit list of track ids. Ids unknown to the service
    /// are absent from the result.
    async fn audio_features(&self, track_ids: &[String]) -> Result<Vec<AudioFeatures>>;

    async fn create_playlist(&self, name: &str, public: bool) -> Result<PlaylistSnapshot>;

    async fn playlist(&self, playlist_id: &str) -> Result<PlaylistSnapshot>;

    async fn remove_all_occurrences(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;

    /// Append tracks, preserving order.
    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;
}
