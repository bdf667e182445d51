use serde::{Deserialize, Serialize};

/// Feature columns in the order they appear in a feature vector.
pub const FEATURE_NAMES: [&str; 13] = [
    "danceability",
    "energy",
    "key",
    "loudness",
    "mode",
    "speechiness",
    "acousticness",
    "instrumentalness",
    "liveness",
    "valence",
    "tempo",
    "duration_ms",
    "time_signature",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    /// Artist names joined with ", ".
    pub artists: String,
    pub track_id: String,
}

impl Track {
    pub fn new(name: &str, artists: &[&str], track_id: &str) -> Self {
        Self {
            name: name.to_string(),
            artists: artists.join(", "),
            track_id: track_id.to_string(),
        }
    }
}

/// Numeric audio descriptors of one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub id: String,
    pub danceability: f64,
    pub energy: f64,
    pub key: f64,
    pub loudness: f64,
    pub mode: f64,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64,
    pub duration_ms: f64,
    pub time_signature: f64,
}

impl AudioFeatures {
    /// Values in `FEATURE_NAMES` order.
    pub fn values(&self) -> Vec<f64> {
        vec![
            self.danceability,
            self.energy,
            self.key,
            self.loudness,
            self.mode,
            self.speechiness,
            self.acousticness,
            self.instrumentalness,
            self.liveness,
            self.valence,
            self.tempo,
            self.duration_ms,
            self.time_signature,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub total_tracks: u32,
}

/// Remote state of a playlist: the reported total and the ids on its first page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSnapshot {
    pub id: String,
    pub name: String,
    pub total: u32,
    pub track_ids: Vec<String>,
}

#[cfg(test)]
impl AudioFeatures {
    pub fn mock(id: &str, energy: f64, tempo: f64) -> Self {
        Self {
            id: id.to_string(),
            danceability: 0.5,
            energy,
            key: 5.0,
            loudness: -8.0,
            mode: 1.0,
            speechiness: 0.05,
            acousticness: 0.2,
            instrumentalness: 0.0,
            liveness: 0.1,
            valence: energy / 2.0,
            tempo,
            duration_ms: 210000.0,
            time_signature: 4.0,
        }
    }
}
