use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::catalog::Track;
use crate::error::Result;
use crate::sync::SyncOutcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterResult {
    /// Position in the sample, 1-based; names the playlist.
    pub index: usize,
    pub cluster: usize,
    pub playlist_name: String,
    pub tracks: Vec<Track>,
    /// `None` on a dry run.
    pub sync: Option<SyncOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub source: String,
    pub total_tracks: usize,
    pub clustered_tracks: usize,
    pub skipped_tracks: Vec<Track>,
    pub num_clusters: usize,
    pub inertia: f64,
    pub normalized: bool,
    pub dry_run: bool,
    pub clusters: Vec<ClusterResult>,
}

impl RunReport {
    pub fn playlists_written(&self) -> usize {
        self.clusters.iter().filter(|c| c.sync.is_some()).count()
    }

    /// Write the report as pretty JSON into `dir`, named by the current time.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");

        fs::create_dir_all(dir)?;

        let filename = dir.join(format!("clusters_{}.json", timestamp));
        let json = serde_json::to_string_pretty(self)?;

        fs::write(&filename, json)?;

        info!("Run report saved to: {}", filename.display());

        Ok(filename)
    }
}
