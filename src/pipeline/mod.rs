pub mod orchestrator;
pub mod report;

pub use orchestrator::{sample_clusters, ClusterPipeline};
pub use report::{ClusterResult, RunReport};
