use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/callback";

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

/// Spotify application credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(alias = "spotipy-client-id")]
    pub spotify_client_id: String,

    #[serde(alias = "spotipy-client-secret")]
    pub spotify_client_secret: String,

    #[serde(alias = "redirect-url", default = "default_redirect_uri")]
    pub spotify_redirect_uri: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let spotify_client_id = std::env::var("SPOTIFY_CLIENT_ID")
            .map_err(|_| AppError::Config("SPOTIFY_CLIENT_ID not set".into()))?;

        let spotify_client_secret = std::env::var("SPOTIFY_CLIENT_SECRET")
            .map_err(|_| AppError::Config("SPOTIFY_CLIENT_SECRET not set".into()))?;

        let spotify_redirect_uri =
            std::env::var("SPOTIFY_REDIRECT_URI").unwrap_or_else(|_| default_redirect_uri());

        Ok(Self {
            spotify_client_id,
            spotify_client_secret,
            spotify_redirect_uri,
        })
    }

    /// Read credentials from a JSON key file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Use the key file when one is given, the environment otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_json_file(path),
            None => Self::from_env(),
        }
    }

    pub fn get_missing_config(&self) -> Vec<String> {
        let mut missing = Vec::new();

        if self.spotify_client_id.is_empty() {
            missing.push("SPOTIFY_CLIENT_ID".to_string());
        }
        if self.spotify_client_secret.is_empty() {
            missing.push("SPOTIFY_CLIENT_SECRET".to_string());
        }

        missing
    }

    pub fn validate_spotify_config(&self) -> bool {
        !self.spotify_client_id.is_empty() && !self.spotify_client_secret.is_empty()
    }
}

/// Parameters of one clustering run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of k-means clusters (K).
    pub num_clusters: usize,
    /// How many clusters are written back as playlists.
    pub sample_size: usize,
    /// Standardize every feature column before clustering.
    pub normalize: bool,
    /// Playlists are named "{prefix} {n}" for n in 1..=sample_size.
    pub playlist_prefix: String,
    /// Rows printed per sampled cluster.
    pub preview_rows: usize,
    /// Seed for initialisation and cluster sampling; random when unset.
    pub seed: Option<u64>,
    /// Upper bound on remove/re-fetch rounds while emptying a playlist.
    pub max_clear_rounds: usize,
    /// Cluster the tracks of this playlist instead of the saved tracks.
    pub source_playlist: Option<String>,
    /// Feature columns left out of the clustering space.
    pub drop_features: Vec<String>,
    /// Print the sampled clusters without touching any playlist.
    pub dry_run: bool,
    /// Where the JSON run report goes; nothing is written when unset.
    pub results_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_clusters: 100,
            sample_size: 3,
            normalize: true,
            playlist_prefix: "k-means, cluster".to_string(),
            preview_rows: 5,
            seed: None,
            max_clear_rounds: 100,
            source_playlist: None,
            drop_features: Vec::new(),
            dry_run: false,
            results_dir: Some(PathBuf::from("cluster_results")),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_clusters == 0 {
            return Err(AppError::Config("cluster count must be at least 1".into()));
        }
        if self.sample_size == 0 {
            return Err(AppError::Config("sample size must be at least 1".into()));
        }
        if self.max_clear_rounds == 0 {
            return Err(AppError::Config(
                "max clear rounds must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn playlist_name(&self, index: usize) -> String {
        format!("{} {}", self.playlist_prefix, index)
    }
}
