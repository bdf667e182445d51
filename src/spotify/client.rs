use async_trait::async_trait;
use rspotify::{
    model::{FullPlaylist, FullTrack, Modality, PlayableId, PlayableItem, PlaylistId, TrackId, UserId},
    prelude::*,
    scopes, AuthCodeSpotify, Credentials, OAuth,
};
use std::io::{self, Write};
use tracing::{debug, info};
use url::Url;

use crate::catalog::{AudioFeatures, CatalogApi, Page, PlaylistSnapshot, PlaylistSummary, Track};
use crate::config::Config;
use crate::error::{AppError, Result};

/// Spotify accepts at most this many items per add/remove request.
const MAX_ITEMS_PER_REQUEST: usize = 100;

pub struct SpotifyClient {
    client: AuthCodeSpotify,
    user_id: String,
}

impl SpotifyClient {
    pub async fn new(config: &Config) -> Result<Self> {
        let creds = Credentials::new(&config.spotify_client_id, &config.spotify_client_secret);

        let oauth = OAuth {
            redirect_uri: config.spotify_redirect_uri.clone(),
            scopes: scopes!(
                "user-library-read",
                "playlist-read-private",
                "playlist-modify-public",
                "playlist-modify-private"
            ),
            ..Default::default()
        };

        let client = AuthCodeSpotify::new(creds, oauth);

        // Get authorization URL
        let auth_url = client.get_authorize_url(false)?;
        println!("\nOpen this URL in your browser to authorize Spotify:");
        println!("{}\n", auth_url);

        print!("Enter the URL you were redirected to: ");
        io::stdout().flush()?;

        let mut redirect_url = String::new();
        io::stdin().read_line(&mut redirect_url)?;

        let code = client
            .parse_response_code(redirect_url.trim())
            .ok_or_else(|| AppError::Auth("Failed to parse authorization code".into()))?;

        client.request_token(&code).await?;

        let user = client.current_user().await?;
        let user_id = user.id.id().to_string();
        let display_name = user.display_name.unwrap_or_else(|| user_id.clone());

        info!("Successfully authenticated as Spotify user: {}", display_name);

        Ok(Self { client, user_id })
    }
}

fn to_track(track: &FullTrack) -> Option<Track> {
    // Local files have no id
    let Some(id) = track.id.as_ref() else {
        debug!("Skipping local track: {}", track.name);
        return None;
    };

    Some(Track {
        name: track.name.clone(),
        artists: track
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        track_id: id.id().to_string(),
    })
}

fn to_features(features: &rspotify::model::AudioFeatures) -> AudioFeatures {
    let mode = match features.mode {
        Modality::Major => 1.0,
        Modality::Minor => 0.0,
        Modality::NoResult => -1.0,
    };

    AudioFeatures {
        id: features.id.id().to_string(),
        danceability: f64::from(features.danceability),
        energy: f64::from(features.energy),
        key: f64::from(features.key),
        loudness: f64::from(features.loudness),
        mode,
        speechiness: f64::from(features.speechiness),
        acousticness: f64::from(features.acousticness),
        instrumentalness: f64::from(features.instrumentalness),
        liveness: f64::from(features.liveness),
        valence: f64::from(features.valence),
        tempo: f64::from(features.tempo),
        duration_ms: features.duration.num_milliseconds() as f64,
        time_signature: f64::from(features.time_signature),
    }
}

fn to_snapshot(playlist: &FullPlaylist) -> PlaylistSnapshot {
    let track_ids = playlist
        .tracks
        .items
        .iter()
        .filter_map(|item| match &item.track {
            Some(PlayableItem::Track(track)) => track.id.as_ref().map(|id| id.id().to_string()),
            _ => None,
        })
        .collect();

    PlaylistSnapshot {
        id: playlist.id.id().to_string(),
        name: playlist.name.clone(),
        total: playlist.tracks.total,
        track_ids,
    }
}

fn playable_ids(track_ids: &[String]) -> Result<Vec<PlayableId<'_>>> {
    let mut items = Vec::with_capacity(track_ids.len());
    for id in track_ids {
        items.push(PlayableId::Track(TrackId::from_id(id.as_str())?));
    }
    Ok(items)
}

#[async_trait]
impl CatalogApi for SpotifyClient {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn saved_tracks_page(&self, limit: u32, offset: u32) -> Result<Page<Track>> {
        let page = self
            .client
            .current_user_saved_tracks_manual(None, Some(limit), Some(offset))
            .await?;

        Ok(Page {
            items: page.items.iter().filter_map(|saved| to_track(&saved.track)).collect(),
            total: page.total,
        })
    }

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Page<Track>> {
        let id = PlaylistId::from_id(playlist_id)?;
        let page = self
            .client
            .playlist_items_manual(id, None, None, Some(limit), Some(offset))
            .await?;

        let items = page
            .items
            .iter()
            .filter_map(|item| match &item.track {
                Some(PlayableItem::Track(track)) => to_track(track),
                _ => None,
            })
            .collect();

        Ok(Page {
            items,
            total: page.total,
        })
    }

    async fn user_playlists_page(&self, limit: u32, offset: u32) -> Result<Page<PlaylistSummary>> {
        let page = self
            .client
            .current_user_playlists_manual(Some(limit), Some(offset))
            .await?;

        let items = page
            .items
            .iter()
            .map(|playlist| PlaylistSummary {
                id: playlist.id.id().to_string(),
                name: playlist.name.clone(),
                owner_id: playlist.owner.id.id().to_string(),
                total_tracks: playlist.tracks.total,
            })
            .collect();

        Ok(Page {
            items,
            total: page.total,
        })
    }

    async fn audio_features(&self, track_ids: &[String]) -> Result<Vec<AudioFeatures>> {
        if track_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = track_ids
            .iter()
            .map(|id| TrackId::from_id(id.as_str()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let features = self.client.tracks_features(ids).await?;
        Ok(features.unwrap_or_default().iter().map(to_features).collect())
    }

    async fn create_playlist(&self, name: &str, public: bool) -> Result<PlaylistSnapshot> {
        let user_id = UserId::from_id(self.user_id.as_str())?;
        let playlist = self
            .client
            .user_playlist_create(user_id, name, Some(public), None, None)
            .await?;

        info!("Created playlist {} ({})", playlist.name, playlist.id.id());
        Ok(to_snapshot(&playlist))
    }

    async fn playlist(&self, playlist_id: &str) -> Result<PlaylistSnapshot> {
        let id = PlaylistId::from_id(playlist_id)?;
        let playlist = self.client.playlist(id, None, None).await?;
        Ok(to_snapshot(&playlist))
    }

    async fn remove_all_occurrences(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let id = PlaylistId::from_id(playlist_id)?;

        for chunk in track_ids.chunks(MAX_ITEMS_PER_REQUEST) {
            let items = playable_ids(chunk)?;
            self.client
                .playlist_remove_all_occurrences_of_items(id.clone_static(), items, None)
                .await?;
        }

        Ok(())
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let id = PlaylistId::from_id(playlist_id)?;

        for chunk in track_ids.chunks(MAX_ITEMS_PER_REQUEST) {
            let items = playable_ids(chunk)?;
            self.client
                .playlist_add_items(id.clone_static(), items, None)
                .await?;
        }

        Ok(())
    }
}

/// Extract a playlist id from a bare id, a `spotify:playlist:` URI or an
/// `open.spotify.com/playlist/` URL (query string ignored).
pub fn parse_playlist_ref(input: &str) -> Result<String> {
    let input = input.trim();

    if let Some(id) = input.strip_prefix("spotify:playlist:") {
        return Ok(id.to_string());
    }

    if !input.contains('/') && !input.contains(':') {
        return Ok(input.to_string());
    }

    let url = Url::parse(input).map_err(|e| AppError::Config(format!("Invalid URL: {}", e)))?;

    let path_segments: Vec<&str> = url
        .path_segments()
        .ok_or_else(|| AppError::Config("Invalid Spotify URL".into()))?
        .collect();

    // Expect /playlist/{id}
    if path_segments.len() >= 2 && path_segments[0] == "playlist" {
        Ok(path_segments[1].to_string())
    } else {
        Err(AppError::Config(
            "URL does not appear to be a Spotify playlist URL".into(),
        ))
    }
}
