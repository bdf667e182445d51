//! Draining offset/limit paged listings.
//!
//! A [`PageCursor`] walks a [`PagedResource`] lazily: pages are requested only
//! when the caller asks for records past the ones already buffered, and the
//! walk ends once the offset reaches the total reported by the server.

use async_trait::async_trait;
use std::collections::VecDeque;
use tracing::debug;

use crate::catalog::{AudioFeatures, CatalogApi, Page, PlaylistSummary, Track};
use crate::error::Result;

pub const SAVED_TRACKS_PAGE_SIZE: u32 = 50;
pub const PLAYLIST_TRACKS_PAGE_SIZE: u32 = 100;
pub const USER_PLAYLISTS_PAGE_SIZE: u32 = 50;
pub const AUDIO_FEATURES_BATCH_SIZE: usize = 50;

#[async_trait]
pub trait PagedResource: Send + Sync {
    type Item: Send;

    async fn fetch_page(&self, limit: u32, offset: u32) -> Result<Page<Self::Item>>;
}

pub struct SavedTracks<'a, C: ?Sized> {
    api: &'a C,
}

impl<'a, C: CatalogApi + ?Sized> SavedTracks<'a, C> {
    pub fn new(api: &'a C) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<'a, C: CatalogApi + ?Sized> PagedResource for SavedTracks<'a, C> {
    type Item = Track;

    async fn fetch_page(&self, limit: u32, offset: u32) -> Result<Page<Track>> {
        self.api.saved_tracks_page(limit, offset).await
    }
}

pub struct PlaylistTracks<'a, C: ?Sized> {
    api: &'a C,
    playlist_id: String,
}

impl<'a, C: CatalogApi + ?Sized> PlaylistTracks<'a, C> {
    pub fn new(api: &'a C, playlist_id: &str) -> Self {
        Self {
            api,
            playlist_id: playlist_id.to_string(),
        }
    }
}

#[async_trait]
impl<'a, C: CatalogApi + ?Sized> PagedResource for PlaylistTracks<'a, C> {
    type Item = Track;

    async fn fetch_page(&self, limit: u32, offset: u32) -> Result<Page<Track>> {
        self.api
            .playlist_tracks_page(&self.playlist_id, limit, offset)
            .await
    }
}

pub struct UserPlaylists<'a, C: ?Sized> {
    api: &'a C,
}

impl<'a, C: CatalogApi + ?Sized> UserPlaylists<'a, C> {
    pub fn new(api: &'a C) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<'a, C: CatalogApi + ?Sized> PagedResource for UserPlaylists<'a, C> {
    type Item = PlaylistSummary;

    async fn fetch_page(&self, limit: u32, offset: u32) -> Result<Page<PlaylistSummary>> {
        self.api.user_playlists_page(limit, offset).await
    }
}

/// Lazy, restartable walk over a paged resource.
pub struct PageCursor<R: PagedResource> {
    resource: R,
    limit: u32,
    start: u32,
    offset: u32,
    total: Option<u32>,
    buffer: VecDeque<R::Item>,
    pages_fetched: usize,
}

impl<R: PagedResource> PageCursor<R> {
    pub fn new(resource: R, limit: u32) -> Self {
        Self {
            resource,
            limit: limit.max(1),
            start: 0,
            offset: 0,
            total: None,
            buffer: VecDeque::new(),
            pages_fetched: 0,
        }
    }

    pub fn starting_at(mut self, offset: u32) -> Self {
        self.start = offset;
        self.offset = offset;
        self
    }

    /// Total reported by the most recent page, if any page was fetched.
    pub fn total(&self) -> Option<u32> {
        self.total
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn is_exhausted(&self) -> bool {
        self.buffer.is_empty() && self.total.is_some_and(|total| self.offset >= total)
    }

    /// Rewind to the starting offset, dropping anything buffered.
    pub fn restart(&mut self) {
        self.offset = self.start;
        self.total = None;
        self.buffer.clear();
    }

    /// Fetch the next page, or `None` once the listing is drained.
    pub async fn next_page(&mut self) -> Result<Option<Vec<R::Item>>> {
        if let Some(total) = self.total {
            if self.offset >= total {
                return Ok(None);
            }
        }

        let page = self.resource.fetch_page(self.limit, self.offset).await?;
        self.pages_fetched += 1;
        self.total = Some(page.total);

        debug!(
            "Fetched page at offset {} ({} items, total {})",
            self.offset,
            page.items.len(),
            page.total
        );

        self.offset = self.offset.saturating_add(self.limit);
        Ok(Some(page.items))
    }

    pub async fn next(&mut self) -> Result<Option<R::Item>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            match self.next_page().await? {
                Some(items) => self.buffer.extend(items),
                None => return Ok(None),
            }
        }
    }

    /// Drain the remaining records.
    pub async fn collect_all(&mut self) -> Result<Vec<R::Item>> {
        let mut items: Vec<R::Item> = self.buffer.drain(..).collect();
        while let Some(page) = self.next_page().await? {
            items.extend(page);
        }
        Ok(items)
    }
}

pub async fn get_saved_tracks<C: CatalogApi + ?Sized>(api: &C) -> Result<Vec<Track>> {
    PageCursor::new(SavedTracks::new(api), SAVED_TRACKS_PAGE_SIZE)
        .collect_all()
        .await
}

pub async fn get_playlist_tracks<C: CatalogApi + ?Sized>(
    api: &C,
    playlist_id: &str,
) -> Result<Vec<Track>> {
    PageCursor::new(
        PlaylistTracks::new(api, playlist_id),
        PLAYLIST_TRACKS_PAGE_SIZE,
    )
    .collect_all()
    .await
}

pub async fn get_all_user_playlists<C: CatalogApi + ?Sized>(
    api: &C,
) -> Result<Vec<PlaylistSummary>> {
    PageCursor::new(UserPlaylists::new(api), USER_PLAYLISTS_PAGE_SIZE)
        .collect_all()
        .await
}

/// Audio features for `track_ids`, requested in fixed-size id batches.
pub async fn get_audio_features<C: CatalogApi + ?Sized>(
    api: &C,
    track_ids: &[String],
) -> Result<Vec<AudioFeatures>> {
    let mut features = Vec::with_capacity(track_ids.len());

    for chunk in track_ids.chunks(AUDIO_FEATURES_BATCH_SIZE) {
        features.extend(api.audio_features(chunk).await?);
    }

    debug!(
        "Fetched audio features for {}/{} tracks",
        features.len(),
        track_ids.len()
    );
    Ok(features)
}
