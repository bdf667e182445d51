use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::catalog::{
    AudioFeatures, CatalogApi, Page, PlaylistSnapshot, PlaylistSummary, Track,
};
use crate::error::{AppError, Result};

/// Mutating calls seen by the mock, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(String),
    Remove(String, Vec<String>),
    Add(String, Vec<String>),
}

#[derive(Debug, Clone)]
struct MockPlaylist {
    id: String,
    name: String,
    owner_id: String,
    tracks: Vec<Track>,
}

#[derive(Default)]
struct MockState {
    saved: Vec<Track>,
    features: HashMap<String, AudioFeatures>,
    playlists: Vec<MockPlaylist>,
    calls: Vec<Call>,
    page_requests: usize,
    playlist_fetches: usize,
    feature_batches: Vec<usize>,
    next_id: usize,
}

/// In-memory catalog used by the tests.
pub struct MockCatalog {
    user_id: String,
    /// How many ids a playlist snapshot lists.
    snapshot_page: usize,
    /// Removals are acknowledged but change nothing.
    stuck: bool,
    state: Mutex<MockState>,
}

impl MockCatalog {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            snapshot_page: 100,
            stuck: false,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_saved_tracks(self, tracks: Vec<Track>) -> Self {
        self.lock().saved = tracks;
        self
    }

    pub fn with_features(self, features: Vec<AudioFeatures>) -> Self {
        {
            let mut state = self.lock();
            for f in features {
                state.features.insert(f.id.clone(), f);
            }
        }
        self
    }

    pub fn with_playlist(self, id: &str, name: &str, owner_id: &str, track_ids: &[&str]) -> Self {
        {
            let mut state = self.lock();
            let tracks = track_ids.iter().map(|t| state.track_for(t)).collect();
            state.playlists.push(MockPlaylist {
                id: id.to_string(),
                name: name.to_string(),
                owner_id: owner_id.to_string(),
                tracks,
            });
        }
        self
    }

    pub fn with_snapshot_page(mut self, size: usize) -> Self {
        self.snapshot_page = size;
        self
    }

    pub fn stuck(mut self) -> Self {
        self.stuck = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn page_requests(&self) -> usize {
        self.lock().page_requests
    }

    pub fn playlist_fetches(&self) -> usize {
        self.lock().playlist_fetches
    }

    pub fn feature_batches(&self) -> Vec<usize> {
        self.lock().feature_batches.clone()
    }

    pub fn playlist_count(&self, name: &str) -> usize {
        self.lock().playlists.iter().filter(|p| p.name == name).count()
    }

    /// Track ids of the first playlist with this name.
    pub fn playlist_track_ids(&self, name: &str) -> Option<Vec<String>> {
        self.lock()
            .playlists
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.tracks.iter().map(|t| t.track_id.clone()).collect())
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn snapshot(&self, playlist: &MockPlaylist) -> PlaylistSnapshot {
        PlaylistSnapshot {
            id: playlist.id.clone(),
            name: playlist.name.clone(),
            total: playlist.tracks.len() as u32,
            track_ids: playlist
                .tracks
                .iter()
                .take(self.snapshot_page)
                .map(|t| t.track_id.clone())
                .collect(),
        }
    }
}

impl MockState {
    fn track_for(&self, id: &str) -> Track {
        self.saved
            .iter()
            .find(|t| t.track_id == id)
            .cloned()
            .unwrap_or_else(|| Track::new(id, &["Unknown"], id))
    }

    fn playlist_mut(&mut self, id: &str) -> Result<&mut MockPlaylist> {
        self.playlists
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }
}

fn page_of<T: Clone>(all: &[T], limit: u32, offset: u32) -> Page<T> {
    let items = all
        .iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect();
    Page {
        items,
        total: all.len() as u32,
    }
}

#[async_trait]
impl CatalogApi for MockCatalog {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn saved_tracks_page(&self, limit: u32, offset: u32) -> Result<Page<Track>> {
        let mut state = self.lock();
        state.page_requests += 1;
        Ok(page_of(&state.saved, limit, offset))
    }

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Page<Track>> {
        let mut state = self.lock();
        state.page_requests += 1;
        let playlist = state.playlist_mut(playlist_id)?;
        Ok(page_of(&playlist.tracks, limit, offset))
    }

    async fn user_playlists_page(&self, limit: u32, offset: u32) -> Result<Page<PlaylistSummary>> {
        let mut state = self.lock();
        state.page_requests += 1;
        let summaries: Vec<PlaylistSummary> = state
            .playlists
            .iter()
            .map(|p| PlaylistSummary {
                id: p.id.clone(),
                name: p.name.clone(),
                owner_id: p.owner_id.clone(),
                total_tracks: p.tracks.len() as u32,
            })
            .collect();
        Ok(page_of(&summaries, limit, offset))
    }

    async fn audio_features(&self, track_ids: &[String]) -> Result<Vec<AudioFeatures>> {
        let mut state = self.lock();
        state.feature_batches.push(track_ids.len());
        Ok(track_ids
            .iter()
            .filter_map(|id| state.features.get(id).cloned())
            .collect())
    }

    async fn create_playlist(&self, name: &str, _public: bool) -> Result<PlaylistSnapshot> {
        let mut state = self.lock();
        state.next_id += 1;
        let playlist = MockPlaylist {
            id: format!("created-{}", state.next_id),
            name: name.to_string(),
            owner_id: self.user_id.clone(),
            tracks: Vec::new(),
        };
        state.calls.push(Call::Create(name.to_string()));
        let snapshot = self.snapshot(&playlist);
        state.playlists.push(playlist);
        Ok(snapshot)
    }

    async fn playlist(&self, playlist_id: &str) -> Result<PlaylistSnapshot> {
        let mut state = self.lock();
        state.playlist_fetches += 1;
        let playlist = state.playlist_mut(playlist_id)?.clone();
        Ok(self.snapshot(&playlist))
    }

    async fn remove_all_occurrences(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let mut state = self.lock();
        state
            .calls
            .push(Call::Remove(playlist_id.to_string(), track_ids.to_vec()));
        let stuck = self.stuck;
        let playlist = state.playlist_mut(playlist_id)?;
        if !stuck {
            playlist.tracks.retain(|t| !track_ids.contains(&t.track_id));
        }
        Ok(())
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let mut state = self.lock();
        state
            .calls
            .push(Call::Add(playlist_id.to_string(), track_ids.to_vec()));
        let tracks: Vec<Track> = track_ids.iter().map(|id| state.track_for(id)).collect();
        state.playlist_mut(playlist_id)?.tracks.extend(tracks);
        Ok(())
    }
}
