//! Chunk records: text passages with their embedding and position metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of item a chunk was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Story,
    Comment,
    Poll,
    PollOpt,
    Job,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Story => "story",
            Self::Comment => "comment",
            Self::Poll => "poll",
            Self::PollOpt => "pollopt",
            Self::Job => "job",
        }
    }

    /// Maps the numeric type code used in CSV exports (1..=5).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Story),
            2 => Some(Self::Comment),
            3 => Some(Self::Poll),
            4 => Some(Self::PollOpt),
            5 => Some(Self::Job),
            _ => None,
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "story" => Ok(Self::Story),
            "comment" => Ok(Self::Comment),
            "poll" => Ok(Self::Poll),
            "pollopt" => Ok(Self::PollOpt),
            "job" => Ok(Self::Job),
            other => Err(format!("unknown chunk type '{other}'")),
        }
    }
}

/// Position of a chunk inside its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Ordinal of the chunk within the document
    #[serde(rename = "chunk_no")]
    pub number: i32,

    /// Start offset in the document text
    #[serde(rename = "chunk_start")]
    pub start: i64,

    /// End offset in the document text
    #[serde(rename = "chunk_end")]
    pub end: i64,
}

/// A stored passage.
///
/// `id` is assigned by the store on insert; any value set by the caller is
/// ignored. `(doc_id, info.number)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    pub doc_id: i64,
    pub title: Option<String>,
    pub author: Option<String>,
    pub text: String,
    pub time: DateTime<Utc>,
    pub kind: ChunkKind,
    pub score: i32,
    pub deleted: bool,
    pub dead: bool,
    pub embedding: Vec<f32>,
    pub info: ChunkMetadata,

    /// Label written by the last clustering run
    #[serde(default)]
    pub cluster_id: Option<u32>,
}

impl Chunk {
    /// Unique key of the chunk within the store.
    pub fn key(&self) -> (i64, i32) {
        (self.doc_id, self.info.number)
    }
}
