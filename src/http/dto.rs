//! Request and response bodies of the chunk API.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::http::ApiError;
use crate::storage::{Chunk, ChunkKind, ChunkMetadata};

/// Results returned by a search when the request does not set `limit`.
pub const DEFAULT_SEARCH_LIMIT: usize = 4;

/// Upper bound on `limit` for a search.
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Body of `POST /chunks`.
///
/// Missing fields take their zero value; unknown fields are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkRequest {
    pub doc_id: i64,
    pub title: Option<String>,
    pub author: Option<String>,
    pub text: String,

    /// RFC 3339 timestamp
    pub time: String,

    /// `story` or `comment`, case-insensitive
    #[serde(rename = "type")]
    pub kind: String,

    pub score: i32,
    pub deleted: bool,
    pub dead: bool,
    pub embedding: Vec<f32>,
    pub chunk_no: i32,
    pub chunk_start: i64,
    pub chunk_end: i64,
}

impl ChunkRequest {
    pub fn into_chunk(self, dimension: usize) -> Result<Chunk, ApiError> {
        let time = DateTime::parse_from_rfc3339(self.time.trim())
            .map_err(|e| ApiError::BadRequest(format!("time parsing: {e}")))?
            .with_timezone(&Utc);

        let kind = match self.kind.parse::<ChunkKind>() {
            Ok(kind @ (ChunkKind::Story | ChunkKind::Comment)) => kind,
            _ => {
                return Err(ApiError::BadRequest(format!(
                    "undefined type '{}'",
                    self.kind.trim()
                )));
            }
        };

        if self.embedding.len() != dimension {
            return Err(ApiError::BadRequest(format!(
                "invalid embedding length: expected {dimension}, got {}",
                self.embedding.len()
            )));
        }

        Ok(Chunk {
            id: 0,
            doc_id: self.doc_id,
            title: self.title,
            author: self.author,
            text: self.text,
            time,
            kind,
            score: self.score,
            deleted: self.deleted,
            dead: self.dead,
            embedding: self.embedding,
            info: ChunkMetadata {
                number: self.chunk_no,
                start: self.chunk_start,
                end: self.chunk_end,
            },
            cluster_id: None,
        })
    }
}

/// A chunk as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResponse {
    pub id: i64,
    pub doc_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub text: String,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    pub score: i32,
    pub deleted: bool,
    pub dead: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub chunk_metadata: ChunkMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<u32>,
}

impl ChunkResponse {
    pub fn from_chunk(chunk: Chunk, with_embedding: bool) -> Self {
        Self {
            id: chunk.id,
            doc_id: chunk.doc_id,
            title: chunk.title,
            author: chunk.author,
            text: chunk.text,
            time: chunk.time.to_rfc3339_opts(SecondsFormat::Secs, true),
            kind: chunk.kind,
            score: chunk.score,
            deleted: chunk.deleted,
            dead: chunk.dead,
            embedding: with_embedding.then_some(chunk.embedding),
            chunk_metadata: chunk.info,
            cluster_id: chunk.cluster_id,
        }
    }
}

/// Body of `POST /chunks/search`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchRequest {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub include_embedding: bool,
    #[serde(default)]
    pub cluster_id: Option<u32>,
}

impl SearchRequest {
    /// Requested limit, defaulted and capped.
    pub fn effective_limit(&self) -> usize {
        match self.limit {
            None | Some(0) => DEFAULT_SEARCH_LIMIT,
            Some(limit) => limit.min(MAX_SEARCH_LIMIT),
        }
    }
}

/// Query string of `GET /chunks/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct ChunkQuery {
    pub embed: Option<String>,
}

impl ChunkQuery {
    pub fn with_embedding(&self) -> bool {
        self.embed.as_deref() == Some("1")
    }
}
