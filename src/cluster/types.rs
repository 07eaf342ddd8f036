//! Core types for the clustering engine.
//!
//! Everything here lives for the duration of one clustering run. The engine
//! keeps no state between runs.

use thiserror::Error;

/// Standard embedding dimension (all-MiniLM-L6-v2 sized vectors).
pub const VECTOR_DIMENSION_384: usize = 384;

/// Iteration count used when a caller passes zero.
pub const DEFAULT_ITERATIONS: usize = 10;

/// Worker count used by the engine when a caller passes zero.
pub const DEFAULT_ENGINE_WORKERS: usize = 1;

/// A single vector to cluster, keyed by the id of the chunk it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPoint {
    pub id: i64,
    pub embedding: Vec<f32>,
}

impl ClusterPoint {
    pub fn new(id: i64, embedding: Vec<f32>) -> Self {
        Self { id, embedding }
    }
}

/// Parameters of one k-means run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Requested number of clusters. Clamped to the number of points.
    pub cluster_count: usize,

    /// Number of assign/recompute rounds. Zero means [`DEFAULT_ITERATIONS`].
    pub iterations: usize,

    /// Size of the worker pool. Zero means [`DEFAULT_ENGINE_WORKERS`].
    pub workers: usize,
}

impl ClusterConfig {
    pub fn new(cluster_count: usize, iterations: usize, workers: usize) -> Self {
        Self {
            cluster_count,
            iterations,
            workers,
        }
    }

    /// Replaces zero iterations/workers with their defaults.
    ///
    /// Callers cannot tell afterwards whether a value was defaulted or
    /// explicitly requested.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            cluster_count: self.cluster_count,
            iterations: if self.iterations == 0 {
                DEFAULT_ITERATIONS
            } else {
                self.iterations
            },
            workers: if self.workers == 0 {
                DEFAULT_ENGINE_WORKERS
            } else {
                self.workers
            },
        }
    }

    /// Cluster count actually used for `point_count` points.
    pub fn effective_cluster_count(&self, point_count: usize) -> usize {
        self.cluster_count.min(point_count)
    }
}

/// Result of a k-means run.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Final centroids, one per effective cluster.
    pub centroids: Vec<Vec<f32>>,

    /// Cluster index for each input vector, from the last assignment pass.
    pub assignments: Vec<u32>,

    /// Number of rounds executed.
    pub iterations: usize,
}

impl KMeansResult {
    pub fn cluster_count(&self) -> usize {
        self.centroids.len()
    }

    /// Number of points assigned to each cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.centroids.len()];
        for &cluster in &self.assignments {
            sizes[cluster as usize] += 1;
        }
        sizes
    }
}

/// Errors that can occur during clustering operations.
///
/// Validation variants are raised before any parallel work is dispatched.
#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error(
        "Empty vector set provided for clustering\nSuggestion: Ensure the source returned at least one embedding"
    )]
    EmptyDataset,

    #[error(
        "Invalid cluster count: {0}\nSuggestion: Use a cluster count between 1 and {max}",
        max = u32::MAX
    )]
    InvalidClusterCount(usize),

    #[error(
        "Dimension mismatch at vector {index}: expected {expected}, got {actual}\nSuggestion: Ensure all vectors come from the same embedding model"
    )]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid initial centroids: {reason}")]
    InvalidCentroids { reason: String },

    #[error("Failed to start clustering worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
