//! Random centroid initialization.
//!
//! Picks `k` distinct input vectors uniformly at random and copies them as the
//! starting centroids. The random source is supplied by the caller so runs can
//! be reproduced with a fixed seed.

use rand::Rng;

use crate::cluster::types::ClusteringError;

/// Samples `k` distinct vectors (without replacement) as initial centroids.
///
/// `k` is clamped to `1..=vectors.len()`.
pub fn init_centroids_random<R>(
    vectors: &[Vec<f32>],
    k: usize,
    rng: &mut R,
) -> Result<Vec<Vec<f32>>, ClusteringError>
where
    R: Rng + ?Sized,
{
    if vectors.is_empty() {
        return Err(ClusteringError::EmptyDataset);
    }

    let k = k.clamp(1, vectors.len());

    Ok(rand::seq::index::sample(rng, vectors.len(), k)
        .into_iter()
        .map(|index| vectors[index].clone())
        .collect())
}
