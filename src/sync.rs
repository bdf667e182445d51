use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{CatalogApi, PlaylistSnapshot};
use crate::error::{AppError, Result};
use crate::pagination::get_all_user_playlists;

pub const DEFAULT_MAX_CLEAR_ROUNDS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub playlist_id: String,
    pub created: bool,
    /// Remove/re-fetch rounds needed to empty the playlist.
    pub clear_rounds: usize,
    pub tracks_added: usize,
}

/// Mirrors a list of track ids into a playlist of the current user, found
/// by name: create or reuse it, empty it, then add the tracks.
pub struct PlaylistSynchronizer<'a, C: ?Sized> {
    api: &'a C,
    max_clear_rounds: usize,
}

impl<'a, C: CatalogApi + ?Sized> PlaylistSynchronizer<'a, C> {
    pub fn new(api: &'a C) -> Self {
        Self {
            api,
            max_clear_rounds: DEFAULT_MAX_CLEAR_ROUNDS,
        }
    }

    pub fn with_max_clear_rounds(mut self, rounds: usize) -> Self {
        self.max_clear_rounds = rounds.max(1);
        self
    }

    pub async fn sync(&self, playlist_name: &str, track_ids: &[String]) -> Result<SyncOutcome> {
        let (playlist, created) = self.find_or_create(playlist_name).await?;
        let playlist_id = playlist.id.clone();
        let clear_rounds = self.clear(playlist).await?;

        if !track_ids.is_empty() {
            self.api.add_tracks(&playlist_id, track_ids).await?;
        }

        info!(
            "Synced {} tracks to playlist '{}'",
            track_ids.len(),
            playlist_name
        );

        Ok(SyncOutcome {
            playlist_id,
            created,
            clear_rounds,
            tracks_added: track_ids.len(),
        })
    }

    async fn find_or_create(&self, playlist_name: &str) -> Result<(PlaylistSnapshot, bool)> {
        let user_id = self.api.user_id();
        let matches: Vec<_> = get_all_user_playlists(self.api)
            .await?
            .into_iter()
            .filter(|p| p.owner_id == user_id && p.name == playlist_name)
            .collect();

        if matches.len() > 1 {
            warn!(
                "{} playlists are named '{}'; reusing the first ({})",
                matches.len(),
                playlist_name,
                matches[0].id
            );
        }

        match matches.first() {
            Some(existing) => {
                debug!("Reusing playlist '{}' ({})", playlist_name, existing.id);
                Ok((self.api.playlist(&existing.id).await?, false))
            }
            None => {
                info!("Creating playlist '{}'", playlist_name);
                Ok((self.api.create_playlist(playlist_name, true).await?, true))
            }
        }
    }

    /// Remove the listed tracks and re-fetch until the playlist reports no
    /// tracks, giving up after `max_clear_rounds` rounds.
    async fn clear(&self, mut playlist: PlaylistSnapshot) -> Result<usize> {
        let mut rounds = 0;

        while playlist.total > 0 {
            if rounds >= self.max_clear_rounds {
                return Err(AppError::Timeout {
                    playlist: playlist.name,
                    rounds,
                });
            }

            if playlist.track_ids.is_empty() {
                warn!(
                    "Playlist '{}' reports {} tracks but lists none",
                    playlist.name, playlist.total
                );
            } else {
                debug!(
                    "Removing {} tracks from '{}' ({} remaining)",
                    playlist.track_ids.len(),
                    playlist.name,
                    playlist.total
                );
                self.api
                    .remove_all_occurrences(&playlist.id, &playlist.track_ids)
                    .await?;
            }

            rounds += 1;
            playlist = self.api.playlist(&playlist.id).await?;
        }

        Ok(rounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::mock::{Call, MockCatalog};

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_replaces_existing_contents() {
        let api = MockCatalog::new("me").with_playlist("p1", "k-means, cluster 1", "me", &["a", "b", "c"]);

        let outcome = PlaylistSynchronizer::new(&api)
            .sync("k-means, cluster 1", &ids(&["x", "y"]))
            .await
            .unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.playlist_id, "p1");
        assert_eq!(outcome.clear_rounds, 1);
        assert_eq!(
            api.playlist_track_ids("k-means, cluster 1").unwrap(),
            ids(&["x", "y"])
        );
    }

    #[tokio::test]
    async fn test_clears_in_rounds_before_adding() {
        let api = MockCatalog::new("me")
            .with_playlist("p1", "Mix", "me", &["a", "b", "c", "d", "e"])
            .with_snapshot_page(2);

        let outcome = PlaylistSynchronizer::new(&api)
            .sync("Mix", &ids(&["x", "y"]))
            .await
            .unwrap();

        assert_eq!(outcome.clear_rounds, 3);
        assert_eq!(
            api.calls(),
            vec![
                Call::Remove("p1".into(), ids(&["a", "b"])),
                Call::Remove("p1".into(), ids(&["c", "d"])),
                Call::Remove("p1".into(), ids(&["e"])),
                Call::Add("p1".into(), ids(&["x", "y"])),
            ]
        );
        // initial fetch plus one per round
        assert_eq!(api.playlist_fetches(), 4);
        assert_eq!(api.playlist_track_ids("Mix").unwrap(), ids(&["x", "y"]));
    }

    #[tokio::test]
    async fn test_creates_missing_playlist() {
        let api = MockCatalog::new("me").with_playlist("p1", "Other", "me", &["a"]);

        let outcome = PlaylistSynchronizer::new(&api)
            .sync("k-means, cluster 2", &ids(&["x"]))
            .await
            .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.clear_rounds, 0);
        assert_eq!(api.calls()[0], Call::Create("k-means, cluster 2".into()));
        assert_eq!(api.playlist_track_ids("k-means, cluster 2").unwrap(), ids(&["x"]));
        assert_eq!(api.playlist_track_ids("Other").unwrap(), ids(&["a"]));
    }

    #[tokio::test]
    async fn test_sync_twice_is_idempotent() {
        let api = MockCatalog::new("me");
        let sync = PlaylistSynchronizer::new(&api);
        let target = ids(&["x", "y", "z"]);

        let first = sync.sync("Cluster", &target).await.unwrap();
        let second = sync.sync("Cluster", &target).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.playlist_id, second.playlist_id);
        assert_eq!(api.playlist_count("Cluster"), 1);
        assert_eq!(api.playlist_track_ids("Cluster").unwrap(), target);
    }

    #[tokio::test]
    async fn test_ignores_playlists_owned_by_others() {
        let api = MockCatalog::new("me").with_playlist("theirs", "Cluster", "someone", &["a"]);

        let outcome = PlaylistSynchronizer::new(&api)
            .sync("Cluster", &ids(&["x"]))
            .await
            .unwrap();

        assert!(outcome.created);
        assert_ne!(outcome.playlist_id, "theirs");
    }

    #[tokio::test]
    async fn test_duplicate_names_use_first_match() {
        let api = MockCatalog::new("me")
            .with_playlist("first", "Cluster", "me", &["a"])
            .with_playlist("second", "Cluster", "me", &["b"]);

        let outcome = PlaylistSynchronizer::new(&api)
            .sync("Cluster", &ids(&["x"]))
            .await
            .unwrap();

        assert_eq!(outcome.playlist_id, "first");
    }

    #[tokio::test]
    async fn test_stuck_playlist_times_out() {
        let api = MockCatalog::new("me")
            .with_playlist("p1", "Stuck", "me", &["a", "b"])
            .stuck();

        let err = PlaylistSynchronizer::new(&api)
            .with_max_clear_rounds(4)
            .sync("Stuck", &ids(&["x"]))
            .await
            .unwrap_err();

        match err {
            AppError::Timeout { playlist, rounds } => {
                assert_eq!(playlist, "Stuck");
                assert_eq!(rounds, 4);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(!api.calls().iter().any(|c| matches!(c, Call::Add(..))));
    }
}
