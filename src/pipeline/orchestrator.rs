use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::time::Duration;
use tracing::{info, warn};

use crate::catalog::{CatalogApi, Track};
use crate::cluster::{cluster_tracks, make_rng, ClusteredTrack, Clustering};
use crate::config::RunConfig;
use crate::error::Result;
use crate::features::build_tracks_plus;
use crate::pagination::{get_playlist_tracks, get_saved_tracks};
use crate::pipeline::report::{ClusterResult, RunReport};
use crate::sync::PlaylistSynchronizer;

/// Pick `sample_size` distinct labels without replacement. Asking for more
/// labels than exist returns all of them.
pub fn sample_clusters<R: Rng + ?Sized>(labels: &[usize], sample_size: usize, rng: &mut R) -> Vec<usize> {
    if sample_size > labels.len() {
        warn!(
            "Only {} clusters available, sampling all of them instead of {}",
            labels.len(),
            sample_size
        );
    }
    labels
        .choose_multiple(rng, sample_size.min(labels.len()))
        .copied()
        .collect()
}

/// Runs fetch, feature assembly, clustering and playlist sync end to end.
pub struct ClusterPipeline<'a, C: ?Sized> {
    api: &'a C,
    config: RunConfig,
}

impl<'a, C: CatalogApi + ?Sized> ClusterPipeline<'a, C> {
    pub fn new(api: &'a C, config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { api, config })
    }

    pub async fn run(&self) -> Result<RunReport> {
        let (source, tracks) = self.fetch_tracks().await?;
        let total_tracks = tracks.len();
        info!("Fetched {} tracks from {}", total_tracks, source);

        let table = build_tracks_plus(self.api, tracks, self.config.normalize).await?;
        let clustering = cluster_tracks(
            &table,
            self.config.num_clusters,
            &self.config.drop_features,
            self.config.seed,
        )?;

        // offset the seed so sampling does not replay the initialisation draws
        let mut rng = make_rng(self.config.seed.map(|s| s.wrapping_add(1)));
        let sampled = sample_clusters(&clustering.labels(), self.config.sample_size, &mut rng);

        let clusters = self.save_clusters(&clustering, &sampled).await?;

        let report = RunReport {
            source,
            total_tracks,
            clustered_tracks: clustering.tracks.len(),
            skipped_tracks: clustering.skipped.clone(),
            num_clusters: clustering.num_clusters,
            inertia: clustering.inertia,
            normalized: self.config.normalize,
            dry_run: self.config.dry_run,
            clusters,
        };

        if let Some(dir) = &self.config.results_dir {
            report.save(dir)?;
        }
        self.print_summary(&report);

        Ok(report)
    }

    async fn fetch_tracks(&self) -> Result<(String, Vec<Track>)> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_message("Fetching tracks...");
        spinner.enable_steady_tick(Duration::from_millis(120));

        let fetched = match &self.config.source_playlist {
            Some(playlist_id) => (
                format!("playlist {}", playlist_id),
                get_playlist_tracks(self.api, playlist_id).await,
            ),
            None => ("saved tracks".to_string(), get_saved_tracks(self.api).await),
        };

        spinner.finish_and_clear();
        let (source, tracks) = fetched;
        Ok((source, tracks?))
    }

    async fn save_clusters(&self, clustering: &Clustering, sampled: &[usize]) -> Result<Vec<ClusterResult>> {
        let synchronizer =
            PlaylistSynchronizer::new(self.api).with_max_clear_rounds(self.config.max_clear_rounds);

        let pb = ProgressBar::new(sampled.len() as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let mut results = Vec::with_capacity(sampled.len());
        for (i, &cluster) in sampled.iter().enumerate() {
            let index = i + 1;
            let playlist_name = self.config.playlist_name(index);
            let members = clustering.members(cluster);

            pb.set_message(format!("Saving: {}", playlist_name));
            pb.suspend(|| self.print_preview(&playlist_name, cluster, &members));

            let track_ids: Vec<String> = members.iter().map(|t| t.track.track_id.clone()).collect();
            let sync = if self.config.dry_run {
                None
            } else {
                Some(synchronizer.sync(&playlist_name, &track_ids).await?)
            };

            results.push(ClusterResult {
                index,
                cluster,
                playlist_name,
                tracks: members.iter().map(|t| t.track.clone()).collect(),
                sync,
            });
            pb.inc(1);
        }

        pb.finish_and_clear();
        Ok(results)
    }

    fn print_preview(&self, playlist_name: &str, cluster: usize, members: &[&ClusteredTrack]) {
        println!();
        println!(
            "{} (cluster {}, {} tracks)",
            playlist_name.cyan().bold(),
            cluster,
            members.len()
        );
        println!("{:<40} {:<30} {:>7}", "name", "artists", "cluster");
        for member in members.iter().take(self.config.preview_rows) {
            println!(
                "{:<40} {:<30} {:>7}",
                truncate(&member.track.name, 40),
                truncate(&member.track.artists, 30),
                member.cluster
            );
        }
    }

    fn print_summary(&self, report: &RunReport) {
        println!();
        println!("{}", "=".repeat(60));
        println!("{}", "CLUSTERING SUMMARY".bold());
        println!("{}", "=".repeat(60));
        println!("Source: {}", report.source);
        println!("Tracks fetched: {}", report.total_tracks);
        println!(
            "Tracks clustered: {}",
            report.clustered_tracks.to_string().green()
        );
        if !report.skipped_tracks.is_empty() {
            println!(
                "Tracks without audio features: {}",
                report.skipped_tracks.len().to_string().yellow()
            );
        }
        println!("Clusters: {}", report.num_clusters);
        println!("Inertia: {:.2}", report.inertia);
        println!("{}", "=".repeat(60));

        for cluster in &report.clusters {
            let status = match &cluster.sync {
                Some(sync) if sync.created => "created".green(),
                Some(_) => "replaced".green(),
                None => "dry run".yellow(),
            };
            println!(
                "  {}: {} tracks ({})",
                cluster.playlist_name,
                cluster.tracks.len(),
                status
            );
        }
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
        cut.push_str("...");
        cut
    }
}
