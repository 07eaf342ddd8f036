//! Chunk storage.
//!
//! The store is reached through three narrow traits so that the HTTP layer,
//! the CSV importer and the clustering orchestrator each depend only on the
//! calls they make. [`ChunkStore`] implements all of them.

mod chunk;
mod error;
mod memory;
pub mod persistence;

pub use chunk::{Chunk, ChunkKind, ChunkMetadata};
pub use error::{StorageError, StorageResult};
pub use memory::{ChunkStore, DEFAULT_FETCH_LIMIT};
pub use persistence::StorePersistence;

use crate::cluster::ClusterPoint;

/// Point lookups, inserts and similarity search over chunks.
pub trait ChunkRepository: Send + Sync {
    /// Inserts one chunk and returns it with its assigned id.
    ///
    /// Fails with [`StorageError::DuplicateKey`] when `(doc_id, chunk_no)`
    /// already exists.
    fn insert_chunk(&self, chunk: Chunk) -> StorageResult<Chunk>;

    /// Inserts a batch, skipping rows whose key already exists.
    ///
    /// Returns the number of rows actually inserted.
    fn insert_batch(&self, batch: Vec<Chunk>) -> StorageResult<u64>;

    fn chunk_by_id(&self, id: i64) -> StorageResult<Chunk>;

    /// Up to `limit` live chunks closest to `query` by squared L2 distance.
    fn search(
        &self,
        query: &[f32],
        limit: usize,
        cluster_id: Option<u32>,
    ) -> StorageResult<Vec<Chunk>>;
}

/// Read side of a clustering run.
pub trait VectorSource: Send + Sync {
    /// Up to `limit` (id, embedding) pairs of live chunks.
    ///
    /// An empty result is not an error.
    fn fetch_clusterable_vectors(&self, limit: usize) -> StorageResult<Vec<ClusterPoint>>;
}

/// Write side of a clustering run.
pub trait LabelSink: Send + Sync {
    /// Sets `cluster_id = labels[i]` for every `ids[i]` in one atomic call.
    ///
    /// Fails with [`StorageError::LengthMismatch`] when the slices differ in
    /// length.
    fn persist_cluster_labels(&self, ids: &[i64], labels: &[u32]) -> StorageResult<()>;
}
