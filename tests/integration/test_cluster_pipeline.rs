//! Clustering runs against a populated store.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{TimeZone, Utc};
use embed_store::cluster::run::run_clustering;
use embed_store::{
    Chunk, ChunkKind, ChunkMetadata, ChunkRepository, ChunkStore, ClusterJob, ClusterRunError,
    LabelSink, StorageError, StorageResult,
};
use tokio_util::sync::CancellationToken;

fn chunk(doc_id: i64, embedding: Vec<f32>, deleted: bool) -> Chunk {
    Chunk {
        id: 0,
        doc_id,
        title: None,
        author: Some("pg".to_string()),
        text: format!("document {doc_id}"),
        time: Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap(),
        kind: ChunkKind::Comment,
        score: 1,
        deleted,
        dead: false,
        embedding,
        info: ChunkMetadata::default(),
        cluster_id: None,
    }
}

/// Three well separated blobs of four points each.
fn populated_store() -> ChunkStore {
    let store = ChunkStore::new(2);
    let centers = [(0.0, 0.0), (100.0, 0.0), (0.0, 100.0)];
    let mut doc_id = 0;
    for (cx, cy) in centers {
        for (dx, dy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
            doc_id += 1;
            store
                .insert_chunk(chunk(doc_id, vec![cx + dx, cy + dy], false))
                .unwrap();
        }
    }
    store
}

fn job(batch_size: usize) -> ClusterJob {
    ClusterJob {
        clusters: 3,
        iterations: 10,
        workers: 3,
        limit: 100,
        batch_size,
        seed: Some(2024),
    }
}

fn labels(store: &ChunkStore) -> Vec<Option<u32>> {
    (1..=12)
        .map(|id| store.chunk_by_id(id).unwrap().cluster_id)
        .collect()
}

#[test]
fn test_every_live_chunk_gets_a_label() {
    let store = populated_store();
    let deleted = store
        .insert_chunk(chunk(99, vec![50.0, 50.0], true))
        .unwrap();

    let report = run_clustering(&store, &store, job(5), &CancellationToken::new()).unwrap();
    assert_eq!(report.rows, 12);
    assert_eq!(report.clusters, 3);
    assert_eq!(report.cluster_sizes.len(), 3);
    assert_eq!(report.cluster_sizes.iter().sum::<usize>(), 12);
    assert_eq!(report.batches, 3);

    for (index, label) in labels(&store).into_iter().enumerate() {
        assert!(
            matches!(label, Some(l) if l < 3),
            "chunk {} has label {label:?}",
            index + 1
        );
    }
    assert_eq!(store.chunk_by_id(deleted.id).unwrap().cluster_id, None);
}

#[test]
fn test_labels_can_filter_search() {
    let store = populated_store();
    run_clustering(&store, &store, job(1000), &CancellationToken::new()).unwrap();

    let anchor = store.chunk_by_id(1).unwrap();
    let label = anchor.cluster_id.unwrap();
    let same_cluster = store.search(&[0.5, 0.5], 100, Some(label)).unwrap();

    assert!(!same_cluster.is_empty());
    assert!(same_cluster.iter().all(|c| c.cluster_id == Some(label)));
    assert!(same_cluster.iter().any(|c| c.id == anchor.id));
}

#[test]
fn test_rerun_overwrites_labels() {
    let store = populated_store();
    run_clustering(&store, &store, job(4), &CancellationToken::new()).unwrap();
    let first = labels(&store);

    run_clustering(&store, &store, job(7), &CancellationToken::new()).unwrap();

    // Same seed and data give the same labels regardless of batch size
    assert_eq!(labels(&store), first);
}

/// Label sink that fails on one call and forwards the rest to the store.
struct FlakySink<'a> {
    store: &'a ChunkStore,
    calls: AtomicUsize,
    fail_on: usize,
}

impl LabelSink for FlakySink<'_> {
    fn persist_cluster_labels(&self, ids: &[i64], labels: &[u32]) -> StorageResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.fail_on {
            return Err(StorageError::General("connection reset".to_string()));
        }
        self.store.persist_cluster_labels(ids, labels)
    }
}

#[test]
fn test_failed_batch_keeps_committed_batches() {
    let store = populated_store();
    let sink = FlakySink {
        store: &store,
        calls: AtomicUsize::new(0),
        fail_on: 1,
    };

    let err = run_clustering(&store, &sink, job(5), &CancellationToken::new()).unwrap_err();
    assert!(matches!(err, ClusterRunError::Sink { start: 5, end: 10, .. }));
    assert_eq!(
        err.to_string(),
        "update cluster ids [5:10]: General error: connection reset"
    );

    let labelled: Vec<usize> = labels(&store)
        .iter()
        .enumerate()
        .filter(|(_, label)| label.is_some())
        .map(|(index, _)| index + 1)
        .collect();
    assert_eq!(labelled, vec![1, 2, 3, 4, 5]);
}
