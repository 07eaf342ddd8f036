//! Chunk storage with CSV ingestion, an HTTP API and parallel k-means
//! clustering of chunk embeddings.

pub mod cluster;
pub mod config;
pub mod http;
pub mod importer;
pub mod logging;
pub mod service;
pub mod storage;

// Explicit exports for better API clarity
pub use cluster::run::{ClusterJob, ClusterReport, ClusterRunError};
pub use cluster::{ClusterConfig, ClusterPoint, ClusteringError, KMeansResult, kmeans};
pub use config::Settings;
pub use importer::{ImportConfig, ImportError, ImportStats, ImportSummary};
pub use storage::{
    Chunk, ChunkKind, ChunkMetadata, ChunkRepository, ChunkStore, LabelSink, StorageError,
    StorageResult, VectorSource,
};
