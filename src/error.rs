use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Spotify API error: {0}")]
    SpotifyApi(#[from] rspotify::ClientError),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid Spotify id: {0}")]
    InvalidId(#[from] rspotify::model::IdError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Clustering error: {0}")]
    Clustering(String),

    #[error("Playlist {playlist} still not empty after {rounds} clearing rounds")]
    Timeout { playlist: String, rounds: usize },

    #[error("Playlist not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
