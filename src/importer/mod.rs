//! CSV import of pre-embedded chunks.
//!
//! One thread parses the file and feeds a bounded channel; a fixed set of
//! workers drains it and writes rows to the store in batches. Counters are
//! shared atomics so progress can be reported while the import runs.

mod columns;
mod parser;
mod pipeline;
mod reader;

pub use columns::{Columns, REQUIRED_COLUMNS};
pub use parser::{CSV_TIME_FORMAT, FieldError, RowParser};
pub use pipeline::{exec_import, run_import};
pub use reader::CsvReader;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cluster::VECTOR_DIMENSION_384;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Invalid import configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("failed to open csv '{path}': {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("read row: {0}")]
    Read(#[from] std::io::Error),

    #[error("read row: unterminated quoted field starting on line {line}")]
    UnterminatedQuote { line: u64 },

    #[error("read header: file is empty")]
    MissingHeader,

    #[error("index columns: missing column \"{name}\"")]
    MissingColumn { name: &'static str },

    #[error("parse row {row} (line {line}): {source}")]
    Row {
        row: u64,
        line: u64,
        #[source]
        source: FieldError,
    },

    #[error("import cancelled after {rows} rows")]
    Cancelled { rows: u64 },

    #[error("import task failed: {0}")]
    Task(String),
}

/// Parameters of one import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    pub file_path: PathBuf,

    /// Number of insert workers; must be positive
    pub workers: usize,

    /// Rows per `insert_batch` call; 0 is treated as 1
    pub batch_size: usize,

    /// Maximum rows to read; 0 reads the whole file
    pub limit: usize,

    /// Expected embedding dimension
    pub dimension: usize,
}

impl ImportConfig {
    pub fn new(file_path: impl Into<PathBuf>, workers: usize) -> Self {
        Self {
            file_path: file_path.into(),
            workers,
            batch_size: 500,
            limit: 0,
            dimension: VECTOR_DIMENSION_384,
        }
    }

    pub fn validate(&self) -> Result<(), ImportError> {
        if self.workers == 0 {
            return Err(ImportError::InvalidConfig {
                reason: "workers must be positive".to_string(),
            });
        }
        if self.file_path.as_os_str().is_empty() {
            return Err(ImportError::InvalidConfig {
                reason: "file path is empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Live counters of an import run.
#[derive(Debug, Default)]
pub struct ImportStats {
    read: AtomicU64,
    inserted: AtomicU64,
    duplicates: AtomicU64,
    failed: AtomicU64,
}

impl ImportStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_read(&self, n: u64) {
        self.read.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_inserted(&self, n: u64) {
        self.inserted.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_duplicates(&self, n: u64) {
        self.duplicates.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_failed(&self, n: u64) {
        self.failed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ImportSummary {
        ImportSummary {
            read: self.read.load(Ordering::Relaxed),
            inserted: self.inserted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ImportStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub read: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub failed: u64,
}
