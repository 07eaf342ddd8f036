//! K-means iteration driver.
//!
//! Runs a fixed number of assign/recompute rounds on a dedicated worker pool.
//!
//! # Algorithm Details
//! - Distance metric: squared Euclidean
//! - Initialization: uniform random sampling without replacement
//! - Iterations: exactly `config.iterations`, no convergence test
//! - Empty clusters keep their previous centroid
//!
//! # Performance Characteristics
//! - O(n * k * d * iterations) time
//! - O(workers * k * d) scratch space for the recompute stage

use rand::Rng;

use crate::cluster::init::init_centroids_random;
use crate::cluster::pool::WorkerPool;
use crate::cluster::stages::{assign_clusters, recompute_centroids};
use crate::cluster::types::{ClusterConfig, ClusteringError, KMeansResult};

/// Clusters `vectors` with randomly sampled initial centroids.
///
/// Validation happens before any work: empty input, a zero cluster count and
/// mismatched dimensions are rejected. A cluster count above the number of
/// vectors is clamped.
#[must_use = "clustering results should be used or the computation is wasted"]
pub fn kmeans<R>(
    vectors: &[Vec<f32>],
    config: ClusterConfig,
    rng: &mut R,
) -> Result<KMeansResult, ClusteringError>
where
    R: Rng + ?Sized,
{
    let dimension = validate_input(vectors, &config)?;
    let k = config.effective_cluster_count(vectors.len());
    let centroids = init_centroids_random(vectors, k, rng)?;

    run_iterations(vectors, centroids, dimension, config.normalized())
}

/// Clusters `vectors` starting from caller-supplied centroids.
///
/// The number of initial centroids is the cluster count; `config.cluster_count`
/// only has to be non-zero. Centroids beyond the number of vectors are
/// dropped, the same clamp [`kmeans`] applies. Used when a run must be
/// reproducible.
#[must_use = "clustering results should be used or the computation is wasted"]
pub fn kmeans_with_centroids(
    vectors: &[Vec<f32>],
    mut initial_centroids: Vec<Vec<f32>>,
    config: ClusterConfig,
) -> Result<KMeansResult, ClusteringError> {
    let dimension = validate_input(vectors, &config)?;

    if initial_centroids.is_empty() {
        return Err(ClusteringError::InvalidCentroids {
            reason: "no centroids supplied".to_string(),
        });
    }
    initial_centroids.truncate(vectors.len());
    if let Some(bad) = initial_centroids.iter().find(|c| c.len() != dimension) {
        return Err(ClusteringError::InvalidCentroids {
            reason: format!("centroid dimension {} != {dimension}", bad.len()),
        });
    }

    run_iterations(vectors, initial_centroids, dimension, config.normalized())
}

/// Checks the input and returns the common dimension.
fn validate_input(vectors: &[Vec<f32>], config: &ClusterConfig) -> Result<usize, ClusteringError> {
    if vectors.is_empty() {
        return Err(ClusteringError::EmptyDataset);
    }

    if config.cluster_count == 0 || config.cluster_count > u32::MAX as usize {
        return Err(ClusteringError::InvalidClusterCount(config.cluster_count));
    }

    let dimension = vectors[0].len();
    if let Some((index, vector)) = vectors
        .iter()
        .enumerate()
        .find(|(_, v)| v.len() != dimension)
    {
        return Err(ClusteringError::DimensionMismatch {
            index,
            expected: dimension,
            actual: vector.len(),
        });
    }

    Ok(dimension)
}

fn run_iterations(
    vectors: &[Vec<f32>],
    mut centroids: Vec<Vec<f32>>,
    dimension: usize,
    config: ClusterConfig,
) -> Result<KMeansResult, ClusteringError> {
    let pool = WorkerPool::new(config.workers)?;
    let cluster_count = centroids.len();
    let mut assignments = Vec::new();

    tracing::debug!(
        points = vectors.len(),
        clusters = cluster_count,
        dimension,
        iterations = config.iterations,
        workers = pool.workers(),
        "kmeans started"
    );

    for iteration in 0..config.iterations {
        assignments = assign_clusters(&pool, vectors, &centroids);
        centroids = recompute_centroids(
            &pool,
            vectors,
            &assignments,
            cluster_count,
            dimension,
            &centroids,
        );

        tracing::trace!(iteration, "kmeans iteration finished");
    }

    Ok(KMeansResult {
        centroids,
        assignments,
        iterations: config.iterations,
    })
}
