//! Flat-file persistence layer.
//!
//! The whole record map lives in one JSON file and is rewritten in full on
//! every mutation; the id counter lives in a second plain-text file. This is
//! deliberately not a durable storage engine: no partial-write recovery, no
//! transactions, no concurrent-writer protection.

mod alloc;

pub use alloc::IdAllocator;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::Patient;

/// Persistence errors. Load-side problems are recovered (empty state) before
/// this type is ever produced; save-side problems propagate to the caller.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Shared state lock poisoned by a panicking writer.
    #[error("state lock poisoned: {0}")]
    Poisoned(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Handle on the records file.
///
/// Keys serialize as string-encoded ids in ascending numeric order; since
/// ids are monotonic and never reused, that order is insertion order, and
/// repeated saves of unchanged state are byte-identical.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full record map. A missing or unparseable file yields an
    /// empty map; load never fails upward.
    pub fn load(&self) -> BTreeMap<u64, Patient> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "records file unreadable, starting with an empty store"
                );
                return BTreeMap::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "records file unparseable, starting with an empty store"
                );
                BTreeMap::new()
            }
        }
    }

    /// Serialize the full record map and rewrite the file.
    pub fn save(&self, records: &BTreeMap<u64, Patient>) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, json).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), count = records.len(), "records persisted");
        Ok(())
    }
}
