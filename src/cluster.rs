//! K-means clustering of the feature table.
//!
//! Lloyd iterations from a k-means++ start, repeated `n_init` times and
//! keeping the run with the lowest inertia (within-cluster sum of squares).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::Track;
use crate::error::{AppError, Result};
use crate::features::FeatureTable;

const DEFAULT_MAX_ITERATIONS: usize = 300;
const DEFAULT_N_INIT: usize = 10;
const DEFAULT_TOLERANCE: f64 = 1e-4;

pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (idx, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(point, centroid);
        if dist < best.1 {
            best = (idx, dist);
        }
    }
    best
}

#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    max_iterations: usize,
    n_init: usize,
    tolerance: f64,
    seed: Option<u64>,
}

/// Result of a k-means fit. Labels are 0-based.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
    pub iterations: usize,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            n_init: DEFAULT_N_INIT,
            tolerance: DEFAULT_TOLERANCE,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    pub fn fit(&self, data: &[Vec<f64>]) -> Result<KMeansFit> {
        if self.k == 0 {
            return Err(AppError::Clustering("cluster count must be at least 1".into()));
        }
        if data.len() < self.k {
            return Err(AppError::Clustering(format!(
                "{} samples cannot form {} clusters",
                data.len(),
                self.k
            )));
        }
        let dims = data[0].len();
        if dims == 0 {
            return Err(AppError::Clustering("no feature columns left to cluster on".into()));
        }
        if data.iter().any(|row| row.len() != dims) {
            return Err(AppError::Clustering("feature rows differ in width".into()));
        }

        let tolerance = self.tolerance * mean_variance(data);
        let mut rng = make_rng(self.seed);

        let mut best: Option<KMeansFit> = None;
        for run in 0..self.n_init {
            let fit = self.fit_single(data, tolerance, &mut rng);
            debug!(
                "k-means run {} converged after {} iterations (inertia {:.4})",
                run + 1,
                fit.iterations,
                fit.inertia
            );
            if best.as_ref().is_none_or(|b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }

        best.ok_or_else(|| AppError::Clustering("k-means produced no result".into()))
    }

    fn fit_single(&self, data: &[Vec<f64>], tolerance: f64, rng: &mut StdRng) -> KMeansFit {
        let mut centroids = kmeans_plus_plus(data, self.k, rng);
        let mut labels = vec![0; data.len()];
        let mut iterations = 0;

        for _ in 0..self.max_iterations {
            iterations += 1;
            assign(data, &centroids, &mut labels);
            reseed_empty_clusters(data, &mut centroids, &mut labels);

            let updated = update_centroids(data, &labels, &centroids);
            let shift: f64 = centroids
                .iter()
                .zip(&updated)
                .map(|(old, new)| squared_distance(old, new))
                .sum();
            centroids = updated;

            if shift <= tolerance {
                break;
            }
        }

        // labels against the final centroids
        assign(data, &centroids, &mut labels);
        reseed_empty_clusters(data, &mut centroids, &mut labels);

        let inertia = data
            .iter()
            .zip(&labels)
            .map(|(point, &label)| squared_distance(point, &centroids[label]))
            .sum();

        KMeansFit {
            labels,
            centroids,
            inertia,
            iterations,
        }
    }
}

fn mean_variance(data: &[Vec<f64>]) -> f64 {
    let n = data.len() as f64;
    let dims = data[0].len();
    let mut total = 0.0;
    for d in 0..dims {
        let mean = data.iter().map(|row| row[d]).sum::<f64>() / n;
        total += data.iter().map(|row| (row[d] - mean).powi(2)).sum::<f64>() / n;
    }
    total / dims as f64
}

/// k-means++: each next centroid is drawn with probability proportional to
/// its squared distance from the closest centroid chosen so far.
fn kmeans_plus_plus(data: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(data[rng.random_range(0..data.len())].clone());

    let mut distances: Vec<f64> = data
        .iter()
        .map(|point| squared_distance(point, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = distances.iter().sum();
        let idx = if total > 0.0 {
            let threshold = rng.random::<f64>() * total;
            let mut acc = 0.0;
            let mut chosen = distances.iter().rposition(|&d| d > 0.0).unwrap_or(0);
            for (i, d) in distances.iter().enumerate() {
                acc += d;
                if acc >= threshold && *d > 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            // every point coincides with a centroid
            rng.random_range(0..data.len())
        };

        let centroid = data[idx].clone();
        for (dist, point) in distances.iter_mut().zip(data) {
            *dist = dist.min(squared_distance(point, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

fn assign(data: &[Vec<f64>], centroids: &[Vec<f64>], labels: &mut [usize]) {
    for (label, point) in labels.iter_mut().zip(data) {
        *label = nearest(point, centroids).0;
    }
}

/// Give every empty cluster the point farthest from its own centroid, taken
/// from a cluster that keeps at least one member.
fn reseed_empty_clusters(data: &[Vec<f64>], centroids: &mut [Vec<f64>], labels: &mut [usize]) {
    let k = centroids.len();
    let mut sizes = vec![0usize; k];
    for &label in labels.iter() {
        sizes[label] += 1;
    }

    for cluster in 0..k {
        if sizes[cluster] > 0 {
            continue;
        }
        let donor = labels
            .iter()
            .enumerate()
            .filter(|&(_, &label)| sizes[label] > 1)
            .map(|(i, &label)| (i, squared_distance(&data[i], &centroids[label])))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((point, _)) = donor {
            sizes[labels[point]] -= 1;
            labels[point] = cluster;
            sizes[cluster] = 1;
            centroids[cluster] = data[point].clone();
        }
    }
}

fn update_centroids(data: &[Vec<f64>], labels: &[usize], previous: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let dims = previous[0].len();
    let mut sums = vec![vec![0.0; dims]; previous.len()];
    let mut counts = vec![0usize; previous.len()];

    for (point, &label) in data.iter().zip(labels) {
        counts[label] += 1;
        for (sum, value) in sums[label].iter_mut().zip(point) {
            *sum += value;
        }
    }

    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((sum, count), prev)| {
            if count == 0 {
                prev.clone()
            } else {
                sum.into_iter().map(|s| s / count as f64).collect()
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteredTrack {
    pub track: Track,
    pub features: Vec<f64>,
    /// 1-based cluster label.
    pub cluster: usize,
}

#[derive(Debug, Clone)]
pub struct Clustering {
    pub num_clusters: usize,
    pub tracks: Vec<ClusteredTrack>,
    /// Tracks left out because they had no audio features.
    pub skipped: Vec<Track>,
    pub inertia: f64,
}

impl Clustering {
    /// Tracks of one cluster, in table order.
    pub fn members(&self, cluster: usize) -> Vec<&ClusteredTrack> {
        self.tracks.iter().filter(|t| t.cluster == cluster).collect()
    }

    /// Distinct labels in ascending order.
    pub fn labels(&self) -> Vec<usize> {
        let mut labels: Vec<usize> = self.tracks.iter().map(|t| t.cluster).collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}

/// Cluster the rows of `table` into `num_clusters` groups labelled 1..=K.
///
/// `drop_vars` names feature columns to leave out of the distance space.
/// Rows without features are not clustered and come back in `skipped`.
pub fn cluster_tracks(
    table: &FeatureTable,
    num_clusters: usize,
    drop_vars: &[String],
    seed: Option<u64>,
) -> Result<Clustering> {
    for name in drop_vars {
        if !table.columns.contains(name) {
            return Err(AppError::Clustering(format!("unknown feature column: {}", name)));
        }
    }
    let keep: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !drop_vars.contains(name))
        .map(|(idx, _)| idx)
        .collect();

    let mut rows = Vec::with_capacity(table.len());
    let mut skipped = Vec::new();
    for row in &table.rows {
        match &row.features {
            Some(features) => rows.push((row.track.clone(), features.clone())),
            None => skipped.push(row.track.clone()),
        }
    }
    if !skipped.is_empty() {
        warn!(
            "Leaving {} tracks without audio features out of clustering",
            skipped.len()
        );
    }

    let data: Vec<Vec<f64>> = rows
        .iter()
        .map(|(_, features)| keep.iter().map(|&idx| features[idx]).collect())
        .collect();

    let fit = KMeans::new(num_clusters).with_seed(seed).fit(&data)?;

    info!(
        "Clustered {} tracks into {} clusters (inertia {:.2})",
        data.len(),
        num_clusters,
        fit.inertia
    );

    let tracks = rows
        .into_iter()
        .zip(fit.labels)
        .map(|((track, features), label)| ClusteredTrack {
            track,
            features,
            cluster: label + 1,
        })
        .collect();

    Ok(Clustering {
        num_clusters,
        tracks,
        skipped,
        inertia: fit.inertia,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AudioFeatures;

    fn blobs() -> Vec<Vec<f64>> {
        let mut data = Vec::new();
        for center in [(0.0, 0.0), (10.0, 10.0), (-10.0, 10.0)] {
            for i in 0..5 {
                let jitter = i as f64 * 0.1;
                data.push(vec![center.0 + jitter, center.1 - jitter]);
            }
        }
        data
    }

    #[test]
    fn test_separated_blobs() {
        let data = blobs();
        let fit = KMeans::new(3).with_seed(Some(7)).fit(&data).unwrap();

        for group in 0..3 {
            let label = fit.labels[group * 5];
            assert!(fit.labels[group * 5..group * 5 + 5].iter().all(|&l| l == label));
        }
        assert_ne!(fit.labels[0], fit.labels[5]);
        assert_ne!(fit.labels[5], fit.labels[10]);
        assert_ne!(fit.labels[0], fit.labels[10]);
    }

    #[test]
    fn test_every_label_used_when_k_equals_n() {
        let data: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64, (i * i) as f64]).collect();
        let fit = KMeans::new(8).with_seed(Some(1)).fit(&data).unwrap();

        let mut labels = fit.labels.clone();
        labels.sort_unstable();
        assert_eq!(labels, (0..8).collect::<Vec<_>>());
        assert!(fit.inertia.abs() < 1e-12);
    }

    #[test]
    fn test_too_few_samples() {
        let data = vec![vec![1.0], vec![2.0]];
        let err = KMeans::new(3).fit(&data).unwrap_err();
        assert!(matches!(err, AppError::Clustering(_)));
    }

    #[test]
    fn test_seed_makes_runs_repeatable() {
        let data = blobs();
        let a = KMeans::new(4).with_seed(Some(42)).fit(&data).unwrap();
        let b = KMeans::new(4).with_seed(Some(42)).fit(&data).unwrap();
        assert_eq!(a.labels, b.labels);
    }

    fn table_of(n: usize) -> FeatureTable {
        let tracks: Vec<Track> = (0..n)
            .map(|i| Track::new(&format!("Song {}", i), &["Artist"], &format!("id{}", i)))
            .collect();
        let features: Vec<AudioFeatures> = (0..n)
            .map(|i| {
                AudioFeatures::mock(&format!("id{}", i), (i % 4) as f64 / 4.0, 60.0 + 7.0 * i as f64)
            })
            .collect();
        FeatureTable::assemble(tracks, features, true)
    }

    #[test]
    fn test_labels_cover_one_to_k() {
        let table = table_of(30);
        let clustering = cluster_tracks(&table, 6, &[], Some(3)).unwrap();

        assert_eq!(clustering.tracks.len(), 30);
        assert!(clustering.tracks.iter().all(|t| (1..=6).contains(&t.cluster)));
        assert_eq!(clustering.labels(), vec![1, 2, 3, 4, 5, 6]);
        let total: usize = clustering.labels().iter().map(|&c| clustering.members(c).len()).sum();
        assert_eq!(total, 30);
    }

    #[test]
    fn test_tracks_without_features_are_skipped() {
        let mut table = table_of(10);
        table.rows[4].features = None;

        let clustering = cluster_tracks(&table, 3, &[], Some(9)).unwrap();

        assert_eq!(clustering.tracks.len(), 9);
        assert_eq!(clustering.skipped.len(), 1);
        assert_eq!(clustering.skipped[0].track_id, "id4");
    }

    #[test]
    fn test_drop_vars() {
        let table = table_of(10);

        let unknown = cluster_tracks(&table, 2, &["uri".to_string()], None);
        assert!(matches!(unknown, Err(AppError::Clustering(_))));

        let dropped = cluster_tracks(&table, 2, &["tempo".to_string(), "energy".to_string()], Some(5))
            .unwrap();
        // full feature vectors are still carried on each row
        assert_eq!(dropped.tracks[0].features.len(), table.columns.len());
    }

    #[test]
    fn test_k_larger_than_rows_is_an_error() {
        let table = table_of(4);
        assert!(matches!(
            cluster_tracks(&table, 5, &[], None),
            Err(AppError::Clustering(_))
        ));
    }
}
