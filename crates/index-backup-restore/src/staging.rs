//! On-disk staging layout.
//!
//! A backup of index `hotels` in directory `dir` consists of:
//!
//! - `dir/hotels.schema`: the raw schema document
//! - `dir/hotels1.json`, `dir/hotels2.json`, ...: one `{"value": [...]}`
//!   envelope per batch, numbered from 1
//!
//! Batch names of different indexes can coincide: `hotels21.json` is batch 21
//! of `hotels` and batch 1 of `hotels2`. A name belongs to the longer index
//! whenever that index has a schema file in the same directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Error, Result};

/// Extension of batch files.
const BATCH_EXTENSION: &str = "json";

/// Extension of the schema file.
const SCHEMA_EXTENSION: &str = "schema";

/// A staged batch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingFile {
    /// Batch sequence number (1-based).
    pub sequence: u64,
    /// File location.
    pub path: PathBuf,
    /// Number of documents in the envelope.
    pub documents: usize,
}

/// Path of the schema file for `index`.
#[must_use]
pub fn schema_path(dir: &Path, index: &str) -> PathBuf {
    dir.join(format!("{}.{}", index, SCHEMA_EXTENSION))
}

/// Path of batch `sequence` for `index`.
#[must_use]
pub fn batch_path(dir: &Path, index: &str, sequence: u64) -> PathBuf {
    dir.join(format!("{}{}.{}", index, sequence, BATCH_EXTENSION))
}

/// Parses the sequence number out of a batch file name, if it belongs to `index`.
///
/// Only `<index><digits>.json` matches, so `hotels-eu1.json` is not a batch of
/// `hotels`. Sequence numbers never start with `0`.
#[must_use]
pub fn parse_batch_sequence(file_name: &str, index: &str) -> Option<u64> {
    let rest = file_name.strip_prefix(index)?;
    let digits = rest.strip_suffix(&format!(".{}", BATCH_EXTENSION))?;
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    digits.parse().ok()
}

/// Returns the other index staged in `dir` whose batch name equals batch
/// `sequence` of `index`, if any.
///
/// `hotels21.json` is owned by `hotels2` when `hotels2.schema` exists.
#[must_use]
pub fn foreign_owner(dir: &Path, index: &str, sequence: u64) -> Option<String> {
    let digits = sequence.to_string();
    (1..digits.len())
        .map(|split| format!("{}{}", index, &digits[..split]))
        .find(|other| schema_path(dir, other).is_file())
}

/// Returns a shorter index staged in `dir` whose batch names start with
/// `index`, if any.
///
/// With `hotels.schema` present, `hotels2` yields `hotels`: the batch files
/// `hotels2<n>.json` may be batches of `hotels`.
#[must_use]
pub fn shorter_owner(dir: &Path, index: &str) -> Option<String> {
    let bytes = index.as_bytes();
    let mut split = bytes.len();
    while split > 1 && bytes[split - 1].is_ascii_digit() {
        split -= 1;
        let other = &index[..split];
        if bytes[split] != b'0' && schema_path(dir, other).is_file() {
            return Some(other.to_string());
        }
    }
    None
}

/// Lists the batch files of `index`, ordered by sequence number.
///
/// Files whose name is also a batch of another index staged in `dir` are
/// skipped with a warning.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn list_batch_files(dir: &Path, index: &str) -> Result<Vec<(u64, PathBuf)>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::staging(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::staging(dir, e))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(sequence) = parse_batch_sequence(name, index) else {
            continue;
        };
        if let Some(other) = foreign_owner(dir, index, sequence) {
            warn!(
                "Skipping {}: it is batch {} of '{}' but also a batch of '{}' staged in {}",
                name,
                sequence,
                index,
                other,
                dir.display()
            );
            continue;
        }
        files.push((sequence, entry.path()));
    }

    files.sort_by_key(|(sequence, _)| *sequence);
    Ok(files)
}

/// Removes batch files of `index` left by an earlier run.
///
/// Only files [`list_batch_files`] attributes to `index` are removed; batches
/// of other indexes sharing the directory are kept. Returns the number of files removed.
///
/// # Errors
///
/// Returns an error if a file cannot be removed.
pub fn clear_batch_files(dir: &Path, index: &str) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let files = list_batch_files(dir, index)?;
    for (_, path) in &files {
        fs::remove_file(path).map_err(|e| Error::staging(path, e))?;
    }
    Ok(files.len())
}

/// Creates the staging directory if needed.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::staging(dir, e))
}

/// Writes `data` to `path` through a temporary sibling and a rename.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::staging(path, e)
    })
}

/// Reads a staged file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::staging(path, e))
}
