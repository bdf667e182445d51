use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::catalog::{AudioFeatures, CatalogApi, Track, FEATURE_NAMES};
use crate::error::Result;
use crate::pagination::get_audio_features;

/// Per-column standardization to zero mean and unit variance.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit on `rows`, all of the same width. Uses the population standard
    /// deviation; a constant column gets scale 1 so it maps to 0.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let n = rows.len() as f64;

        let mut means = vec![0.0; width];
        for row in rows {
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value;
            }
        }
        for mean in &mut means {
            *mean /= n;
        }

        let mut scales = vec![0.0; width];
        for row in rows {
            for ((var, value), mean) in scales.iter_mut().zip(row).zip(&means) {
                *var += (value - mean).powi(2);
            }
        }
        for scale in &mut scales {
            let std = (*scale / n).sqrt();
            *scale = if std > f64::EPSILON { std } else { 1.0 };
        }

        Self { means, scales }
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(value, (mean, scale))| (value - mean) / scale)
            .collect()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }
}

/// A track joined with its (possibly standardized) feature vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPlus {
    pub track: Track,
    /// `None` when the service returned no features for the track.
    pub features: Option<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub rows: Vec<TrackPlus>,
}

impl FeatureTable {
    /// Left join `features` onto `tracks` by track id, standardizing first
    /// when `normalize` is set. Every track yields exactly one row, in order.
    pub fn assemble(tracks: Vec<Track>, features: Vec<AudioFeatures>, normalize: bool) -> Self {
        let mut by_id: HashMap<String, Vec<f64>> = HashMap::with_capacity(features.len());
        let mut ids = Vec::with_capacity(features.len());
        for record in features {
            if by_id.contains_key(&record.id) {
                continue;
            }
            ids.push(record.id.clone());
            by_id.insert(record.id.clone(), record.values());
        }

        if normalize && !ids.is_empty() {
            let raw: Vec<Vec<f64>> = ids.iter().filter_map(|id| by_id.get(id).cloned()).collect();
            let scaler = StandardScaler::fit(&raw);
            for values in by_id.values_mut() {
                *values = scaler.transform(values);
            }
        }

        let rows: Vec<TrackPlus> = tracks
            .into_iter()
            .map(|track| {
                let features = by_id.get(&track.track_id).cloned();
                TrackPlus { track, features }
            })
            .collect();

        Self {
            columns: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn missing_features(&self) -> usize {
        self.rows.iter().filter(|r| r.features.is_none()).count()
    }
}

/// Fetch audio features for `tracks` and assemble the joined table.
pub async fn build_tracks_plus<C: CatalogApi + ?Sized>(
    api: &C,
    tracks: Vec<Track>,
    normalize: bool,
) -> Result<FeatureTable> {
    let ids: Vec<String> = tracks.iter().map(|t| t.track_id.clone()).collect();
    let features = get_audio_features(api, &ids).await?;

    let table = FeatureTable::assemble(tracks, features, normalize);

    let missing = table.missing_features();
    if missing > 0 {
        warn!("{} tracks have no audio features", missing);
    }
    info!(
        "Assembled features for {} tracks (normalized={})",
        table.len(),
        normalize
    );

    Ok(table)
}
