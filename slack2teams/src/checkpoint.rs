//! File-level progress markers that make the migration resumable.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;

use crate::archive;

/// Tracks which message files have been fully migrated. A file is either
/// pending or done, never half-marked; `mark_done` flips the state only
/// after every message in the file was submitted.
pub trait Checkpoint {
    fn pending(&self, dir: &Path) -> Result<Vec<PathBuf>>;
    fn is_done(&self, file: &Path) -> bool;
    fn mark_done(&self, file: &Path) -> Result<()>;
}

/// Checkpoint store backed by a rename: pending files keep their `.json`
/// extension, done files gain a `.done` suffix. The rename is atomic, so a
/// crash leaves every file unambiguously in one state and a file still
/// pending after a crash is safe to reprocess from the start.
pub struct RenameCheckpoint {
    pending_pattern: Regex,
    done_suffix: &'static str,
}

impl RenameCheckpoint {
    pub fn new() -> Self {
        Self {
            pending_pattern: Regex::new(r"\.json$").expect("valid pattern"),
            done_suffix: "done",
        }
    }
}

impl Default for RenameCheckpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Checkpoint for RenameCheckpoint {
    fn pending(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        archive::list_message_files(dir, &self.pending_pattern)
    }

    fn is_done(&self, file: &Path) -> bool {
        file.extension()
            .map(|ext| ext == self.done_suffix)
            .unwrap_or(false)
    }

    fn mark_done(&self, file: &Path) -> Result<()> {
        let done = file.with_extension(format!("json.{}", self.done_suffix));
        fs::rename(file, &done)
            .with_context(|| format!("cannot mark {} as done", file.display()))?;
        Ok(())
    }
}
