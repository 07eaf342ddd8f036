//! Distance math shared by the clustering stages and the search path.

/// Squared Euclidean distance between two vectors of equal length.
///
/// No square root is taken: callers only compare distances.
#[inline]
pub fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

/// Index of the centroid closest to `vector`.
///
/// Ties resolve to the lowest index. `centroids` must be non-empty.
pub fn nearest_centroid(vector: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best_index = 0;
    let mut best_distance = squared_distance(vector, &centroids[0]);

    for (index, centroid) in centroids.iter().enumerate().skip(1) {
        let distance = squared_distance(vector, centroid);
        // Strict comparison keeps the first centroid on ties
        if distance < best_distance {
            best_distance = distance;
            best_index = index;
        }
    }

    best_index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squared_distance() {
        assert_eq!(squared_distance(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
        assert_eq!(squared_distance(&[1.5, -2.0], &[1.5, -2.0]), 0.0);
        assert_eq!(squared_distance(&[], &[]), 0.0);
    }

    #[test]
    fn test_nearest_centroid() {
        let centroids = vec![vec![0.0, 0.0], vec![10.0, 0.0], vec![5.0, 5.0]];

        assert_eq!(nearest_centroid(&[0.0, 1.0], &centroids), 0);
        assert_eq!(nearest_centroid(&[9.0, 1.0], &centroids), 1);
        assert_eq!(nearest_centroid(&[5.0, 6.0], &centroids), 2);
    }

    #[test]
    fn test_nearest_centroid_tie_prefers_lowest_index() {
        let centroids = vec![vec![-1.0], vec![1.0], vec![1.0]];
        assert_eq!(nearest_centroid(&[0.0], &centroids), 0);

        let duplicates = vec![vec![2.0], vec![1.0], vec![1.0]];
        assert_eq!(nearest_centroid(&[1.0], &duplicates), 1);
    }
}
