pub mod catalog;
pub mod cluster;
pub mod config;
pub mod error;
pub mod features;
pub mod pagination;
pub mod pipeline;
pub mod spotify;
pub mod sync;

pub use catalog::{AudioFeatures, CatalogApi, PlaylistSnapshot, PlaylistSummary, Track};
pub use cluster::{cluster_tracks, ClusteredTrack, Clustering, KMeans};
pub use config::{Config, RunConfig};
pub use error::{AppError, Result};
pub use features::{build_tracks_plus, FeatureTable, StandardScaler, TrackPlus};
pub use pagination::PageCursor;
pub use pipeline::{ClusterPipeline, RunReport};
pub use spotify::SpotifyClient;
pub use sync::{PlaylistSynchronizer, SyncOutcome};
