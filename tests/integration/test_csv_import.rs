//! CSV import into a store, followed by lookup and persistence.

use std::path::{Path, PathBuf};

use embed_store::importer::{REQUIRED_COLUMNS, run_import};
use embed_store::{
    ChunkKind, ChunkRepository, ChunkStore, ImportConfig, ImportError, ImportStats, ImportSummary,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const DIM: usize = 4;

fn vector(seed: usize) -> String {
    let parts: Vec<String> = (0..DIM)
        .map(|i| ((seed * 10 + i) as f32 / 100.0).to_string())
        .collect();
    format!("\"[{}]\"", parts.join(","))
}

/// Header in a shuffled order with an extra column, CRLF line endings.
fn write_export(dir: &Path, rows: usize) -> PathBuf {
    let mut header: Vec<&str> = REQUIRED_COLUMNS.to_vec();
    header.reverse();
    header.push("url");

    let mut body = header.join(",");
    body.push_str("\r\n");

    for i in 0..rows {
        let author = if i % 2 == 0 { "alice" } else { "" };
        body.push_str(&format!(
            "0,{end},{start},{vector},0,0,{score},{kind},2019-12-31 23:59:59.123,\
             \"line one of {i}\r\nline \"\"two\"\"\",{author},Title {i},{doc_id},https://example.com\r\n",
            end = i * 100 + 99,
            start = i * 100,
            vector = vector(i),
            score = i as i64 - 1,
            kind = i % 5 + 1,
            doc_id = 1000 + i,
        ));
    }

    let path = dir.join("export.csv");
    std::fs::write(&path, body).unwrap();
    path
}

fn config(path: PathBuf) -> ImportConfig {
    ImportConfig {
        file_path: path,
        workers: 4,
        batch_size: 3,
        limit: 0,
        dimension: DIM,
    }
}

#[test]
fn test_import_export_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_export(temp_dir.path(), 20);

    let store = ChunkStore::new(DIM);
    let stats = ImportStats::new();
    run_import(&store, &config(path), &stats, &CancellationToken::new()).unwrap();

    assert_eq!(
        stats.snapshot(),
        ImportSummary {
            read: 20,
            inserted: 20,
            duplicates: 0,
            failed: 0
        }
    );

    // Workers insert concurrently, so look rows up by their content
    let all = store.search(&[0.0; DIM], 100, None).unwrap();
    assert_eq!(all.len(), 20);

    let seventh = all.iter().find(|c| c.doc_id == 1007).unwrap();
    assert_eq!(seventh.title.as_deref(), Some("Title 7"));
    assert_eq!(seventh.author, None);
    assert_eq!(seventh.text, "line one of 7\nline \"two\"");
    assert_eq!(seventh.kind, ChunkKind::Poll);
    assert_eq!(seventh.score, 6);
    assert_eq!(seventh.info.start, 700);
    assert_eq!(seventh.info.end, 799);
    assert_eq!(seventh.embedding, vec![0.7, 0.71, 0.72, 0.73]);
    assert_eq!(seventh.time.to_rfc3339(), "2019-12-31T23:59:59.123+00:00");

    let eighth = all.iter().find(|c| c.doc_id == 1008).unwrap();
    assert_eq!(eighth.author.as_deref(), Some("alice"));
    assert_eq!(eighth.kind, ChunkKind::PollOpt);
}

#[test]
fn test_reimport_counts_duplicates_and_persists() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_export(temp_dir.path(), 8);
    let data_path = temp_dir.path().join("store").join("chunks.json");

    let store = ChunkStore::open(&data_path, DIM).unwrap();
    run_import(&store, &config(path.clone()), &ImportStats::new(), &CancellationToken::new())
        .unwrap();

    let stats = ImportStats::new();
    run_import(&store, &config(path), &stats, &CancellationToken::new()).unwrap();
    assert_eq!(stats.snapshot().duplicates, 8);
    assert_eq!(stats.snapshot().inserted, 0);

    store.save().unwrap();
    let reopened = ChunkStore::open(&data_path, DIM).unwrap();
    assert_eq!(reopened.len(), 8);
}

#[test]
fn test_header_only_and_empty_files() {
    let temp_dir = TempDir::new().unwrap();
    let store = ChunkStore::new(DIM);

    let header_only = temp_dir.path().join("header.csv");
    std::fs::write(&header_only, REQUIRED_COLUMNS.join(",")).unwrap();
    let stats = ImportStats::new();
    run_import(&store, &config(header_only), &stats, &CancellationToken::new()).unwrap();
    assert_eq!(stats.snapshot().read, 0);

    let empty = temp_dir.path().join("empty.csv");
    std::fs::write(&empty, "").unwrap();
    let err = run_import(&store, &config(empty), &ImportStats::new(), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, ImportError::MissingHeader));
}

#[test]
fn test_non_finite_vector_stops_import_and_store_reopens() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_export(temp_dir.path(), 3);
    let body = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, body.replace("\"[0.1,0.11", "\"[NaN,0.11")).unwrap();

    let data_path = temp_dir.path().join("chunks.json");
    let store = ChunkStore::open(&data_path, DIM).unwrap();
    let err = run_import(&store, &config(path), &ImportStats::new(), &CancellationToken::new())
        .unwrap_err();

    // Row 1 spans lines 2-3, so row 2 starts on line 4
    match &err {
        ImportError::Row { row, line, source } => {
            assert_eq!((*row, *line), (2, 4));
            assert_eq!(source.field, "vector");
        }
        other => panic!("expected row error, got {other:?}"),
    }
    assert_eq!(store.len(), 1);

    store.save().unwrap();
    let reopened = ChunkStore::open(&data_path, DIM).unwrap();
    assert_eq!(reopened.len(), 1);
    let stored = reopened.search(&[0.0; DIM], 10, None).unwrap();
    assert!(stored[0].embedding.iter().all(|v| v.is_finite()));
}
