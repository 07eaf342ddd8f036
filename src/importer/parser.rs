//! Field-level parsing of CSV rows into [`Chunk`]s.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use crate::cluster::VECTOR_DIMENSION_384;
use crate::importer::columns::Columns;
use crate::storage::{Chunk, ChunkKind, ChunkMetadata};

/// Timestamp layout of the `time` column.
pub const CSV_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// A single field that failed to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl FieldError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

type FieldResult<T> = Result<T, FieldError>;

/// Row parser for a fixed embedding dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowParser {
    dimension: usize,
}

impl Default for RowParser {
    fn default() -> Self {
        Self::new(VECTOR_DIMENSION_384)
    }
}

impl RowParser {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Blank (after trimming) means absent.
    pub fn nullable_string(&self, value: &str) -> Option<String> {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    pub fn int64(&self, field: &'static str, value: &str) -> FieldResult<i64> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(FieldError::new(field, "empty integer"));
        }
        trimmed
            .parse::<i64>()
            .map_err(|e| FieldError::new(field, e.to_string()))
    }

    pub fn bool01(&self, field: &'static str, value: &str) -> FieldResult<bool> {
        match value.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(FieldError::new(field, format!("expected 0/1, got {other:?}"))),
        }
    }

    /// Parses `YYYY-MM-DD HH:MM:SS.mmm` as UTC.
    pub fn time(&self, field: &'static str, value: &str) -> FieldResult<DateTime<Utc>> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(FieldError::new(field, "empty time"));
        }
        NaiveDateTime::parse_from_str(trimmed, CSV_TIME_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| FieldError::new(field, e.to_string()))
    }

    pub fn kind(&self, field: &'static str, value: &str) -> FieldResult<ChunkKind> {
        let trimmed = value.trim();
        trimmed
            .parse::<u8>()
            .ok()
            .and_then(ChunkKind::from_code)
            .ok_or_else(|| {
                FieldError::new(field, format!("unknown type {trimmed:?} (expected 1..5)"))
            })
    }

    /// Parses `[x1, x2, ...]` with exactly `dimension` components.
    pub fn vector(&self, field: &'static str, value: &str) -> FieldResult<Vec<f32>> {
        let body = value
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| FieldError::new(field, "vector not in [..] format"))?;

        if body.trim().is_empty() {
            return Err(FieldError::new(field, "empty vector"));
        }

        let parts: Vec<&str> = body.split(',').collect();
        if parts.len() != self.dimension {
            return Err(FieldError::new(
                field,
                format!("vector length {} != {}", parts.len(), self.dimension),
            ));
        }

        parts
            .iter()
            .enumerate()
            .map(|(index, part)| {
                let value = part
                    .trim()
                    .parse::<f32>()
                    .map_err(|e| FieldError::new(field, format!("vector[{index}]: {e}")))?;
                if !value.is_finite() {
                    return Err(FieldError::new(
                        field,
                        format!("vector[{index}]: {:?} is not a finite number", part.trim()),
                    ));
                }
                Ok(value)
            })
            .collect()
    }

    /// Converts one record into an unsaved chunk (`id` is 0).
    ///
    /// Cells missing from a short row are treated as empty.
    pub fn parse_row(&self, record: &[String], columns: &Columns) -> FieldResult<Chunk> {
        let cell = |idx: usize| record.get(idx).map(String::as_str).unwrap_or("");

        let doc_id = self.int64("doc_id", cell(columns.doc_id))?;
        let title = self.nullable_string(cell(columns.title));
        let author = self.nullable_string(cell(columns.author));

        let text = cell(columns.text);
        if text.is_empty() {
            return Err(FieldError::new("text", "empty"));
        }

        let time = self.time("time", cell(columns.time))?;
        let kind = self.kind("type", cell(columns.kind))?;
        let score = self.int64("score", cell(columns.score))?;
        let dead = self.bool01("dead", cell(columns.dead))?;
        let deleted = self.bool01("deleted", cell(columns.deleted))?;
        let embedding = self.vector("vector", cell(columns.vector))?;
        let start = self.int64("chunk_start", cell(columns.chunk_start))?;
        let end = self.int64("chunk_end", cell(columns.chunk_end))?;
        let number = self.int64("chunk_no", cell(columns.chunk_no))?;

        Ok(Chunk {
            id: 0,
            doc_id,
            title,
            author,
            text: text.to_string(),
            time,
            kind,
            score: narrow("score", score)?,
            deleted,
            dead,
            embedding,
            info: ChunkMetadata {
                number: narrow("chunk_no", number)?,
                start,
                end,
            },
            cluster_id: None,
        })
    }
}

fn narrow(field: &'static str, value: i64) -> FieldResult<i32> {
    i32::try_from(value).map_err(|_| FieldError::new(field, format!("{value} out of range")))
}
