//! K-means clustering over chunk embeddings.
//!
//! The engine (`kmeans`, `kmeans_with_centroids`) is a pure function of its
//! inputs: a fixed initial centroid set and configuration always produce the
//! same labels, independent of the worker count. [`run`] drives a full pass
//! against the store and writes labels back in batches.

mod init;
mod kmeans;
mod math;
mod pool;
pub mod run;
mod stages;
mod types;

pub use init::init_centroids_random;
pub use kmeans::{kmeans, kmeans_with_centroids};
pub use math::{nearest_centroid, squared_distance};
pub use pool::{WorkerPool, chunk_size};
pub use run::{ClusterJob, ClusterReport, ClusterRunError, exec_cluster, run_clustering};
pub use stages::{assign_clusters, recompute_centroids};
pub use types::{
    ClusterConfig, ClusterPoint, ClusteringError, DEFAULT_ENGINE_WORKERS, DEFAULT_ITERATIONS,
    KMeansResult, VECTOR_DIMENSION_384,
};
