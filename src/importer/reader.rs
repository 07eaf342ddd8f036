//! Quote-aware CSV record reader.
//!
//! Handles quoted fields with doubled quotes, newlines inside quotes and CRLF
//! line endings. Rows may have any number of fields and blank lines are
//! skipped.

use std::io::BufRead;

use crate::importer::ImportError;

pub struct CsvReader<R> {
    inner: R,
    line: String,
    line_no: u64,
    record_line: u64,
}

impl<R: BufRead> CsvReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: String::new(),
            line_no: 0,
            record_line: 0,
        }
    }

    /// Physical line the last record started on (1-based).
    pub fn record_line(&self) -> u64 {
        self.record_line
    }

    /// Reads the next record, or `None` at end of input.
    pub fn read_record(&mut self) -> Result<Option<Vec<String>>, ImportError> {
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut at_field_start = true;
        let mut started = false;
        let mut record_start = self.line_no + 1;

        loop {
            self.line.clear();
            let read = self.inner.read_line(&mut self.line)?;
            if read == 0 {
                if !started {
                    return Ok(None);
                }
                if in_quotes {
                    return Err(ImportError::UnterminatedQuote { line: record_start });
                }
                fields.push(field);
                self.record_line = record_start;
                return Ok(Some(fields));
            }
            self.line_no += 1;

            if !started && self.line.trim_end_matches(['\r', '\n']).is_empty() {
                record_start = self.line_no + 1;
                continue;
            }
            started = true;

            let mut chars = self.line.chars().peekable();
            while let Some(c) = chars.next() {
                if in_quotes {
                    match c {
                        '"' if chars.peek() == Some(&'"') => {
                            chars.next();
                            field.push('"');
                        }
                        '"' => in_quotes = false,
                        '\r' if chars.peek() == Some(&'\n') => {}
                        _ => field.push(c),
                    }
                    continue;
                }

                match c {
                    ',' => {
                        fields.push(std::mem::take(&mut field));
                        at_field_start = true;
                        continue;
                    }
                    '"' if at_field_start => in_quotes = true,
                    '\r' if matches!(chars.peek(), Some(&'\n') | None) => {}
                    '\n' => {
                        fields.push(field);
                        self.record_line = record_start;
                        return Ok(Some(fields));
                    }
                    _ => field.push(c),
                }
                at_field_start = false;
            }
        }
    }
}
