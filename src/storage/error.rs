use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Duplicate key: chunk {chunk_no} of document {doc_id} already exists")]
    DuplicateKey { doc_id: i64, chunk_no: i32 },

    #[error("Chunk {id} not found")]
    NotFound { id: i64 },

    #[error("ids len {ids} != cluster ids len {labels}")]
    LengthMismatch { ids: usize, labels: usize },

    #[error("Invalid embedding length: expected {expected}, got {actual}")]
    InvalidEmbedding { expected: usize, actual: usize },

    #[error("Invalid embedding value at index {index}: {value} is not finite")]
    NonFiniteEmbedding { index: usize, value: f32 },

    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid snapshot '{path}': {reason}")]
    InvalidSnapshot { path: PathBuf, reason: String },

    #[error("General error: {0}")]
    General(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
