//! Manifest persistence: an ordered JSON array of records on disk.
//!
//! The manifest is the single piece of durable shared state between the
//! builder and the prompting engine. It is read fully once, mutated only in
//! memory, and rewritten wholesale as a checkpoint after every batch. Each
//! rewrite goes through an atomic staging file so a crash never leaves a torn
//! array on disk; a restart loses at most one batch of progress.

use std::io::Write;
use std::path::Path;

use atomic_write_file::AtomicWriteFile;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{EditsetError, Result};

/// In-memory record collection, exclusively owned by the orchestrating
/// process for the duration of a run. Record count is fixed at load time;
/// only field sets grow.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<Map<String, Value>>,
}

impl RecordSet {
    /// Load a manifest from disk. The file must be a JSON array of objects.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EditsetError::ManifestNotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = fs_err::read(path)?;
        let value: Value = serde_json::from_slice(&bytes)?;
        let Value::Array(items) = value else {
            return Err(EditsetError::InvalidManifest {
                path: path.to_path_buf(),
            });
        };
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let Value::Object(map) = item else {
                return Err(EditsetError::InvalidManifest {
                    path: path.to_path_buf(),
                });
            };
            records.push(map);
        }
        Ok(Self { records })
    }

    /// Rewrite the full record set to `path`, atomically.
    pub fn checkpoint(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, &self.records)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Map<String, Value>> {
        self.records.get(index)
    }

    /// String field accessor. Returns `None` for absent or non-string values.
    #[must_use]
    pub fn str_field(&self, index: usize, field: &str) -> Option<&str> {
        self.records.get(index)?.get(field)?.as_str()
    }

    /// True when `field` holds a non-empty string on record `index`.
    #[must_use]
    pub fn has_nonempty(&self, index: usize, field: &str) -> bool {
        self.str_field(index, field)
            .is_some_and(|text| !text.trim().is_empty())
    }

    pub fn set_field(&mut self, index: usize, field: &str, value: Value) {
        if let Some(record) = self.records.get_mut(index) {
            record.insert(field.to_string(), value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Map<String, Value>> {
        self.records.iter()
    }
}

impl From<Vec<Map<String, Value>>> for RecordSet {
    fn from(records: Vec<Map<String, Value>>) -> Self {
        Self { records }
    }
}

/// Serialize `value` as pretty JSON and commit it to `path` atomically,
/// creating parent directories as needed.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }
    let mut atomic = AtomicWriteFile::options().open(path)?;
    serde_json::to_writer_pretty(atomic.as_file_mut(), value)?;
    atomic.as_file_mut().write_all(b"\n")?;
    atomic.commit()?;
    Ok(())
}
