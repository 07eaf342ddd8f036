use std::collections::HashMap;

use crate::importer::ImportError;

/// Position of every required column in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub doc_id: usize,
    pub title: usize,
    pub author: usize,
    pub text: usize,
    pub time: usize,
    pub kind: usize,
    pub score: usize,
    pub dead: usize,
    pub deleted: usize,
    pub vector: usize,
    pub chunk_start: usize,
    pub chunk_end: usize,
    pub chunk_no: usize,
}

/// Header names the importer requires, in the order they are resolved.
pub const REQUIRED_COLUMNS: [&str; 13] = [
    "doc_id",
    "title",
    "author",
    "text",
    "time",
    "type",
    "score",
    "dead",
    "deleted",
    "vector",
    "chunk_start",
    "chunk_end",
    "chunk_no",
];

impl Columns {
    /// Resolves column positions from a header row.
    ///
    /// Names are whitespace-trimmed and may appear in any order; extra columns
    /// are ignored. When a name repeats, the last occurrence wins.
    pub fn from_header(header: &[String]) -> Result<Self, ImportError> {
        let index: HashMap<&str, usize> = header
            .iter()
            .enumerate()
            .map(|(pos, name)| (name.trim().trim_start_matches('\u{feff}'), pos))
            .collect();

        let find = |name: &'static str| {
            index
                .get(name)
                .copied()
                .ok_or(ImportError::MissingColumn { name })
        };

        Ok(Self {
            doc_id: find("doc_id")?,
            title: find("title")?,
            author: find("author")?,
            text: find("text")?,
            time: find("time")?,
            kind: find("type")?,
            score: find("score")?,
            dead: find("dead")?,
            deleted: find("deleted")?,
            vector: find("vector")?,
            chunk_start: find("chunk_start")?,
            chunk_end: find("chunk_end")?,
            chunk_no: find("chunk_no")?,
        })
    }
}
