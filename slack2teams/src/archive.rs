//! Streaming reader for the export's JSON files.
//!
//! Export files come in three framings depending on the exporter version: a
//! single top-level array, a sequence of concatenated objects, or one object
//! per line. [`ObjectReader`] yields the top-level objects one at a time for
//! all three without materialising a whole file as one JSON document.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

enum Framing {
    Array,
    Stream,
}

pub struct ObjectReader<R: BufRead> {
    reader: R,
    framing: Framing,
    finished: bool,
    first: bool,
}

/// Opens `path` and returns a fresh object sequence over it. Each call
/// reopens the file, so the sequence is restartable.
pub fn stream_objects(path: &Path) -> Result<ObjectReader<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    ObjectReader::new(BufReader::new(file))
}

impl<R: BufRead> ObjectReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let framing = match peek_non_ws(&mut reader)? {
            Some(b'[') => {
                consume_byte(&mut reader)?;
                Framing::Array
            }
            _ => Framing::Stream,
        };
        Ok(Self {
            reader,
            framing,
            finished: false,
            first: true,
        })
    }

    fn advance(&mut self) -> Result<Option<Value>> {
        match self.framing {
            Framing::Array => match peek_non_ws(&mut self.reader)? {
                None => return Ok(None),
                Some(b']') => {
                    consume_byte(&mut self.reader)?;
                    return Ok(None);
                }
                Some(b',') if !self.first => {
                    consume_byte(&mut self.reader)?;
                    if let Some(b']') = peek_non_ws(&mut self.reader)? {
                        consume_byte(&mut self.reader)?;
                        return Ok(None);
                    }
                }
                Some(_) => {}
            },
            Framing::Stream => {
                if peek_non_ws(&mut self.reader)?.is_none() {
                    return Ok(None);
                }
            }
        }
        self.first = false;
        let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
        let value = Value::deserialize(&mut de).context("malformed JSON object in archive file")?;
        Ok(Some(value))
    }
}

impl<R: BufRead> Iterator for ObjectReader<R> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.advance() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                // No way to resync inside a broken file, stop after reporting.
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn peek_non_ws<R: BufRead>(reader: &mut R) -> Result<Option<u8>> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(None);
        }
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(i) => {
                let byte = buf[i];
                reader.consume(i);
                return Ok(Some(byte));
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}

fn consume_byte<R: BufRead>(reader: &mut R) -> Result<()> {
    let mut one = [0u8; 1];
    reader.read_exact(&mut one)?;
    Ok(())
}

/// Lists the files in a channel folder whose names match `pattern`, sorted
/// by name so per-day files replay in chronological order.
pub fn list_message_files(dir: &Path, pattern: &Regex) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("cannot list channel folder {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if pattern.is_match(name) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(input: &str) -> Vec<Value> {
        ObjectReader::new(Cursor::new(input.as_bytes()))
            .unwrap()
            .map(|v| v.unwrap())
            .collect()
    }

    #[test]
    fn reads_a_top_level_array() {
        let values = collect(r#"[{"ts": "1"}, {"ts": "2"}]"#);
        assert_eq!(values.len(), 2);
        assert_eq!(values[1]["ts"], "2");
    }

    #[test]
    fn reads_newline_delimited_objects() {
        let values = collect("{\"ts\": \"1\"}\n{\"ts\": \"2\"}\n");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn reads_concatenated_objects_without_newlines() {
        let values = collect(r#"{"ts": "1"} {"ts": "2"}"#);
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn empty_array_and_empty_file_yield_nothing() {
        assert!(collect("[]").is_empty());
        assert!(collect("   ").is_empty());
    }

    #[test]
    fn malformed_tail_surfaces_one_error_then_stops() {
        let mut reader = ObjectReader::new(Cursor::new(&b"{\"ts\": \"1\"} {oops"[..])).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn lists_only_matching_files_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["2021-01-16.json", "2021-01-15.json", "2021-01-14.json.done"] {
            std::fs::write(dir.path().join(name), "[]").unwrap();
        }
        let pattern = Regex::new(r"\.json$").unwrap();
        let files = list_message_files(dir.path(), &pattern).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["2021-01-15.json", "2021-01-16.json"]);
    }
}
