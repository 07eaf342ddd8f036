//! Parallel assignment and recompute stages of k-means.
//!
//! Both stages use the same contiguous chunking from [`WorkerPool`]. Workers
//! never share mutable state: the assignment stage hands each worker a
//! disjoint output slice, and the recompute stage gives each worker its own
//! accumulator which is merged afterwards on the calling thread.

use rayon::prelude::*;

use crate::cluster::math::nearest_centroid;
use crate::cluster::pool::WorkerPool;

/// Assigns every vector to the index of its nearest centroid.
///
/// Returns one index per input vector, in input order. `centroids` must be
/// non-empty.
pub fn assign_clusters(
    pool: &WorkerPool,
    vectors: &[Vec<f32>],
    centroids: &[Vec<f32>],
) -> Vec<u32> {
    let mut assignments = vec![0u32; vectors.len()];
    if vectors.is_empty() {
        return assignments;
    }

    let chunk = pool.chunk_size(vectors.len());
    pool.install(|| {
        assignments
            .par_chunks_mut(chunk)
            .zip(vectors.par_chunks(chunk))
            .for_each(|(out, slice)| {
                for (slot, vector) in out.iter_mut().zip(slice) {
                    *slot = nearest_centroid(vector, centroids) as u32;
                }
            });
    });

    assignments
}

/// Per-worker running sums and counts, one entry per cluster.
#[derive(Debug, Clone)]
struct ClusterAccumulator {
    sums: Vec<Vec<f64>>,
    counts: Vec<usize>,
}

impl ClusterAccumulator {
    fn new(cluster_count: usize, dimension: usize) -> Self {
        Self {
            sums: vec![vec![0.0; dimension]; cluster_count],
            counts: vec![0; cluster_count],
        }
    }

    fn add(&mut self, cluster: usize, vector: &[f32]) {
        self.counts[cluster] += 1;
        for (sum, &value) in self.sums[cluster].iter_mut().zip(vector) {
            *sum += f64::from(value);
        }
    }

    fn merge(&mut self, other: &ClusterAccumulator) {
        for (cluster, count) in other.counts.iter().enumerate() {
            self.counts[cluster] += count;
            for (total, partial) in self.sums[cluster].iter_mut().zip(&other.sums[cluster]) {
                *total += partial;
            }
        }
    }
}

/// Recomputes each centroid as the mean of the vectors assigned to it.
///
/// Map phase: every worker accumulates sums/counts for its chunk into a
/// private accumulator. Reduce phase: the accumulators are merged in worker
/// order on the calling thread. A cluster with no members keeps the centroid
/// it had in `previous`.
pub fn recompute_centroids(
    pool: &WorkerPool,
    vectors: &[Vec<f32>],
    assignments: &[u32],
    cluster_count: usize,
    dimension: usize,
    previous: &[Vec<f32>],
) -> Vec<Vec<f32>> {
    debug_assert_eq!(vectors.len(), assignments.len());
    debug_assert_eq!(previous.len(), cluster_count);

    let chunk = pool.chunk_size(vectors.len());
    let locals: Vec<ClusterAccumulator> = pool.install(|| {
        vectors
            .par_chunks(chunk)
            .zip(assignments.par_chunks(chunk))
            .map(|(slice, labels)| {
                let mut local = ClusterAccumulator::new(cluster_count, dimension);
                for (vector, &label) in slice.iter().zip(labels) {
                    local.add(label as usize, vector);
                }
                local
            })
            .collect()
    });

    let mut totals = ClusterAccumulator::new(cluster_count, dimension);
    for local in &locals {
        totals.merge(local);
    }

    totals
        .sums
        .iter()
        .zip(&totals.counts)
        .zip(previous)
        .map(|((sum, &count), prev)| {
            if count == 0 {
                return prev.clone();
            }
            let inv = 1.0 / count as f64;
            sum.iter().map(|&value| (value * inv) as f32).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::math::squared_distance;

    fn grid_vectors() -> Vec<Vec<f32>> {
        vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![10.0, 0.0],
            vec![10.0, 1.0],
            vec![5.0, 5.0],
            vec![5.0, 6.0],
        ]
    }

    #[test]
    fn test_assign_clusters_nearest() {
        let pool = WorkerPool::new(2).unwrap();
        let centroids = vec![vec![0.0, 0.0], vec![10.0, 0.0], vec![5.0, 5.0]];

        let assignments = assign_clusters(&pool, &grid_vectors(), &centroids);
        assert_eq!(assignments, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_assign_clusters_is_nearest_for_every_point() {
        let pool = WorkerPool::new(4).unwrap();
        let vectors: Vec<Vec<f32>> = (0..97)
            .map(|i| vec![(i % 13) as f32, (i % 7) as f32 * 0.5, (i / 10) as f32])
            .collect();
        let centroids = vec![vec![0.0, 0.0, 0.0], vec![6.0, 1.5, 4.0], vec![12.0, 3.0, 9.0]];

        let assignments = assign_clusters(&pool, &vectors, &centroids);
        assert_eq!(assignments.len(), vectors.len());

        for (vector, &label) in vectors.iter().zip(&assignments) {
            let own = squared_distance(vector, &centroids[label as usize]);
            for centroid in &centroids {
                assert!(own <= squared_distance(vector, centroid));
            }
        }
    }

    #[test]
    fn test_assign_clusters_empty_input() {
        let pool = WorkerPool::new(3).unwrap();
        let assignments = assign_clusters(&pool, &[], &[vec![1.0]]);
        assert!(assignments.is_empty());
    }

    #[test]
    fn test_recompute_centroids_means() {
        let pool = WorkerPool::new(3).unwrap();
        let previous = vec![vec![0.0, 0.0], vec![10.0, 0.0], vec![5.0, 5.0]];

        let centroids =
            recompute_centroids(&pool, &grid_vectors(), &[0, 0, 1, 1, 2, 2], 3, 2, &previous);
        assert_eq!(
            centroids,
            vec![vec![0.0, 0.5], vec![10.0, 0.5], vec![5.0, 5.5]]
        );
    }

    #[test]
    fn test_recompute_keeps_previous_centroid_for_empty_cluster() {
        let pool = WorkerPool::new(2).unwrap();
        let previous = vec![vec![1.0, 1.0], vec![-3.25, 7.5], vec![4.0, 4.0]];

        // Nobody is assigned to cluster 1
        let centroids =
            recompute_centroids(&pool, &grid_vectors(), &[0, 0, 2, 2, 2, 2], 3, 2, &previous);

        assert_eq!(centroids[1], previous[1]);
        assert_eq!(centroids[0], vec![0.0, 0.5]);
        assert_eq!(centroids[2], vec![7.5, 3.0]);
    }

    #[test]
    fn test_recompute_independent_of_worker_count() {
        let vectors: Vec<Vec<f32>> = (0..1000)
            .map(|i| vec![(i % 17) as f32 * 0.25, (i % 5) as f32, -((i % 11) as f32)])
            .collect();
        let assignments: Vec<u32> = (0..1000).map(|i| (i % 4) as u32).collect();
        let previous = vec![vec![0.0; 3]; 5];

        let single = recompute_centroids(
            &WorkerPool::new(1).unwrap(),
            &vectors,
            &assignments,
            5,
            3,
            &previous,
        );
        for workers in [2, 3, 7, 16] {
            let parallel = recompute_centroids(
                &WorkerPool::new(workers).unwrap(),
                &vectors,
                &assignments,
                5,
                3,
                &previous,
            );
            assert_eq!(single, parallel, "workers={workers}");
        }
    }
}
