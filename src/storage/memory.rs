use crate::cluster::{ClusterPoint, squared_distance};
use crate::storage::persistence::{SNAPSHOT_VERSION, Snapshot, StorePersistence};
use crate::storage::{
    Chunk, ChunkRepository, LabelSink, StorageError, StorageResult, VectorSource,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Row limit used when a clustering fetch asks for zero rows.
pub const DEFAULT_FETCH_LIMIT: usize = 10_000;

#[derive(Debug)]
struct Table {
    rows: BTreeMap<i64, Chunk>,
    by_key: HashMap<(i64, i32), i64>,
    next_id: i64,
}

impl Table {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            by_key: HashMap::new(),
            next_id: 1,
        }
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut table = Self::new();
        for chunk in snapshot.chunks {
            table.by_key.insert(chunk.key(), chunk.id);
            table.next_id = table.next_id.max(chunk.id + 1);
            table.rows.insert(chunk.id, chunk);
        }
        table.next_id = table.next_id.max(snapshot.next_id);
        table
    }

    fn insert(&mut self, mut chunk: Chunk) -> Chunk {
        chunk.id = self.next_id;
        self.next_id += 1;
        self.by_key.insert(chunk.key(), chunk.id);
        self.rows.insert(chunk.id, chunk.clone());
        chunk
    }
}

/// In-process chunk table.
///
/// Reads take a shared lock; every mutating call takes the write lock once,
/// so each call is atomic with respect to other callers.
#[derive(Debug)]
pub struct ChunkStore {
    dimension: usize,
    table: RwLock<Table>,
    persistence: Option<StorePersistence>,
}

impl ChunkStore {
    /// Creates an empty store that is never written to disk.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            table: RwLock::new(Table::new()),
            persistence: None,
        }
    }

    /// Opens a store backed by a snapshot file, loading it if it exists.
    pub fn open(path: impl AsRef<Path>, dimension: usize) -> StorageResult<Self> {
        let persistence = StorePersistence::new(path.as_ref());

        let table = match persistence.load()? {
            Some(snapshot) => {
                if snapshot.dimension != dimension {
                    return Err(StorageError::InvalidSnapshot {
                        path: persistence.path().to_path_buf(),
                        reason: format!(
                            "snapshot dimension {} does not match configured dimension {dimension}",
                            snapshot.dimension
                        ),
                    });
                }
                let table = Table::from_snapshot(snapshot);
                tracing::info!(
                    path = %persistence.path().display(),
                    chunks = table.rows.len(),
                    "chunk store loaded"
                );
                table
            }
            None => {
                tracing::info!(
                    path = %persistence.path().display(),
                    "starting with empty chunk store"
                );
                Table::new()
            }
        };

        Ok(Self {
            dimension,
            table: RwLock::new(table),
            persistence: Some(persistence),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.table.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().rows.is_empty()
    }

    /// Writes the snapshot file. A no-op for stores created with [`ChunkStore::new`].
    pub fn save(&self) -> StorageResult<()> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };

        let snapshot = {
            let table = self.table.read();
            Snapshot {
                version: SNAPSHOT_VERSION,
                dimension: self.dimension,
                next_id: table.next_id,
                chunks: table.rows.values().cloned().collect(),
            }
        };
        persistence.save(&snapshot)?;

        tracing::debug!(
            path = %persistence.path().display(),
            chunks = snapshot.chunks.len(),
            "chunk store saved"
        );
        Ok(())
    }

    /// Rejects embeddings of the wrong dimension or with NaN/infinite
    /// components, which the snapshot could not load back.
    fn validate_embedding(&self, embedding: &[f32]) -> StorageResult<()> {
        if embedding.len() != self.dimension {
            return Err(StorageError::InvalidEmbedding {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        if let Some(index) = embedding.iter().position(|value| !value.is_finite()) {
            return Err(StorageError::NonFiniteEmbedding {
                index,
                value: embedding[index],
            });
        }
        Ok(())
    }
}

impl ChunkRepository for ChunkStore {
    fn insert_chunk(&self, chunk: Chunk) -> StorageResult<Chunk> {
        self.validate_embedding(&chunk.embedding)?;

        let mut table = self.table.write();
        if table.by_key.contains_key(&chunk.key()) {
            return Err(StorageError::DuplicateKey {
                doc_id: chunk.doc_id,
                chunk_no: chunk.info.number,
            });
        }
        Ok(table.insert(chunk))
    }

    fn insert_batch(&self, batch: Vec<Chunk>) -> StorageResult<u64> {
        if batch.is_empty() {
            return Ok(0);
        }
        for chunk in &batch {
            self.validate_embedding(&chunk.embedding)?;
        }

        let mut table = self.table.write();
        let mut inserted = 0u64;
        for chunk in batch {
            // Conflicting rows are skipped, including duplicates within the batch
            if table.by_key.contains_key(&chunk.key()) {
                continue;
            }
            table.insert(chunk);
            inserted += 1;
        }
        Ok(inserted)
    }

    fn chunk_by_id(&self, id: i64) -> StorageResult<Chunk> {
        self.table
            .read()
            .rows
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound { id })
    }

    fn search(
        &self,
        query: &[f32],
        limit: usize,
        cluster_id: Option<u32>,
    ) -> StorageResult<Vec<Chunk>> {
        self.validate_embedding(query)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let table = self.table.read();
        let mut scored: Vec<(f32, &Chunk)> = table
            .rows
            .values()
            .filter(|chunk| !chunk.deleted)
            .filter(|chunk| cluster_id.is_none() || chunk.cluster_id == cluster_id)
            .map(|chunk| (squared_distance(query, &chunk.embedding), chunk))
            .collect();

        scored.sort_by(|(da, a), (db, b)| da.total_cmp(db).then(a.id.cmp(&b.id)));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, chunk)| chunk.clone())
            .collect())
    }
}

impl VectorSource for ChunkStore {
    fn fetch_clusterable_vectors(&self, limit: usize) -> StorageResult<Vec<ClusterPoint>> {
        let limit = if limit == 0 { DEFAULT_FETCH_LIMIT } else { limit };

        Ok(self
            .table
            .read()
            .rows
            .values()
            .filter(|chunk| !chunk.deleted)
            .take(limit)
            .map(|chunk| ClusterPoint::new(chunk.id, chunk.embedding.clone()))
            .collect())
    }
}

impl LabelSink for ChunkStore {
    fn persist_cluster_labels(&self, ids: &[i64], labels: &[u32]) -> StorageResult<()> {
        if ids.len() != labels.len() {
            return Err(StorageError::LengthMismatch {
                ids: ids.len(),
                labels: labels.len(),
            });
        }
        if ids.is_empty() {
            return Ok(());
        }

        let mut table = self.table.write();
        for (id, &label) in ids.iter().zip(labels) {
            if let Some(chunk) = table.rows.get_mut(id) {
                chunk.cluster_id = Some(label);
            }
        }
        Ok(())
    }
}
