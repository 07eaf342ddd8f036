//! Clustering orchestrator.
//!
//! Pulls embeddings from a [`VectorSource`], runs k-means, and writes the
//! labels back to a [`LabelSink`] in sequential batches. Batches already
//! written stay committed when a later batch fails; re-running is safe since
//! every batch overwrites the previous label of its ids.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::cluster::kmeans::kmeans;
use crate::cluster::types::{ClusterConfig, ClusteringError};
use crate::storage::{LabelSink, StorageError, VectorSource};

pub const DEFAULT_CLUSTERS: usize = 64;
pub const DEFAULT_RUN_ITERATIONS: usize = 10;
pub const DEFAULT_RUN_WORKERS: usize = 4;
pub const DEFAULT_LIMIT: usize = 20_000;
pub const DEFAULT_BATCH_SIZE: usize = 1_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30 * 60;

/// Parameters of one orchestrated clustering run.
///
/// Zero values are replaced with the defaults above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterJob {
    pub clusters: usize,
    pub iterations: usize,
    pub workers: usize,
    pub limit: usize,
    pub batch_size: usize,

    /// Fixed seed for centroid sampling. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for ClusterJob {
    fn default() -> Self {
        Self {
            clusters: DEFAULT_CLUSTERS,
            iterations: DEFAULT_RUN_ITERATIONS,
            workers: DEFAULT_RUN_WORKERS,
            limit: DEFAULT_LIMIT,
            batch_size: DEFAULT_BATCH_SIZE,
            seed: None,
        }
    }
}

impl ClusterJob {
    #[must_use]
    pub fn with_defaults(self) -> Self {
        fn or(value: usize, default: usize) -> usize {
            if value == 0 { default } else { value }
        }

        Self {
            clusters: or(self.clusters, DEFAULT_CLUSTERS),
            iterations: or(self.iterations, DEFAULT_RUN_ITERATIONS),
            workers: or(self.workers, DEFAULT_RUN_WORKERS),
            limit: or(self.limit, DEFAULT_LIMIT),
            batch_size: or(self.batch_size, DEFAULT_BATCH_SIZE),
            seed: self.seed,
        }
    }

    pub fn engine_config(&self) -> ClusterConfig {
        ClusterConfig::new(self.clusters, self.iterations, self.workers)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterReport {
    /// Rows labelled (zero when the source was empty).
    pub rows: usize,

    /// Effective number of clusters.
    pub clusters: usize,

    /// Members per cluster, indexed by label.
    pub cluster_sizes: Vec<usize>,

    /// Number of sink calls made.
    pub batches: usize,

    pub elapsed: Duration,
}

/// Errors from an orchestrated run, tagged with the stage that failed.
#[derive(Error, Debug)]
pub enum ClusterRunError {
    #[error("cluster source: {0}")]
    Source(#[source] StorageError),

    #[error("kmeans: {0}")]
    Engine(#[from] ClusteringError),

    #[error("update cluster ids [{start}:{end}]: {source}")]
    Sink {
        start: usize,
        end: usize,
        #[source]
        source: StorageError,
    },

    #[error("clustering cancelled before {stage}")]
    Cancelled { stage: &'static str },

    #[error("clustering task failed: {0}")]
    Task(String),
}

impl ClusterRunError {
    /// Name of the stage the run failed in.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Source(_) => "fetch",
            Self::Engine(_) => "kmeans",
            Self::Sink { .. } => "persist",
            Self::Cancelled { stage } => stage,
            Self::Task(_) => "task",
        }
    }
}

/// Runs one clustering pass synchronously.
///
/// `cancel` is checked before the fetch, after the engine returns and before
/// every batch. The engine itself always runs to completion once started.
pub fn run_clustering<S, K>(
    source: &S,
    sink: &K,
    job: ClusterJob,
    cancel: &CancellationToken,
) -> Result<ClusterReport, ClusterRunError>
where
    S: VectorSource + ?Sized,
    K: LabelSink + ?Sized,
{
    let job = job.with_defaults();
    let start = Instant::now();

    tracing::info!(
        clusters = job.clusters,
        iterations = job.iterations,
        workers = job.workers,
        limit = job.limit,
        batch_size = job.batch_size,
        "clusterization started"
    );

    check_cancelled(cancel, "fetch")?;
    let points = source
        .fetch_clusterable_vectors(job.limit)
        .map_err(ClusterRunError::Source)?;

    if points.is_empty() {
        tracing::warn!("cluster source returned 0 rows");
        return Ok(ClusterReport {
            rows: 0,
            clusters: 0,
            cluster_sizes: Vec::new(),
            batches: 0,
            elapsed: start.elapsed(),
        });
    }

    let (ids, vectors): (Vec<i64>, Vec<Vec<f32>>) = points
        .into_iter()
        .map(|point| (point.id, point.embedding))
        .unzip();

    let mut rng = match job.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let result = kmeans(&vectors, job.engine_config(), &mut rng)?;
    drop(vectors);

    let mut batches = 0;
    for start_idx in (0..ids.len()).step_by(job.batch_size) {
        let end_idx = (start_idx + job.batch_size).min(ids.len());
        check_cancelled(cancel, "persist")?;

        sink.persist_cluster_labels(
            &ids[start_idx..end_idx],
            &result.assignments[start_idx..end_idx],
        )
        .map_err(|source| ClusterRunError::Sink {
            start: start_idx,
            end: end_idx,
            source,
        })?;
        batches += 1;

        tracing::debug!(from = start_idx, to = end_idx, "cluster ids updated");
    }

    let report = ClusterReport {
        rows: ids.len(),
        clusters: result.cluster_count(),
        cluster_sizes: result.cluster_sizes(),
        batches,
        elapsed: start.elapsed(),
    };

    tracing::info!(
        rows = report.rows,
        clusters = report.clusters,
        largest = report.cluster_sizes.iter().max().copied().unwrap_or(0),
        empty = report.cluster_sizes.iter().filter(|&&size| size == 0).count(),
        duration = ?report.elapsed,
        "clusterization finished"
    );
    Ok(report)
}

/// Runs [`run_clustering`] on a blocking thread with a deadline.
///
/// The deadline cancels `cancel`'s child token after `timeout`; the run then
/// stops at its next cancellation check.
pub async fn exec_cluster<S>(
    store: Arc<S>,
    job: ClusterJob,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<ClusterReport, ClusterRunError>
where
    S: VectorSource + LabelSink + 'static,
{
    let run_token = cancel.child_token();
    let deadline_token = run_token.clone();
    let deadline = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(timeout = ?timeout, "clusterization deadline reached");
                deadline_token.cancel();
            }
            _ = deadline_token.cancelled() => {}
        }
    });

    let task_token = run_token.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        run_clustering(store.as_ref(), store.as_ref(), job, &task_token)
    })
    .await
    .map_err(|e| ClusterRunError::Task(e.to_string()))
    .and_then(|result| result);

    // Stops the deadline timer
    run_token.cancel();
    let _ = deadline.await;

    if let Err(e) = &outcome {
        tracing::error!(stage = e.stage(), error = %e, "clusterization failed");
    }
    outcome
}

fn check_cancelled(
    cancel: &CancellationToken,
    stage: &'static str,
) -> Result<(), ClusterRunError> {
    if cancel.is_cancelled() {
        return Err(ClusterRunError::Cancelled { stage });
    }
    Ok(())
}
