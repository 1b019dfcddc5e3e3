//! Sequential id allocation backed by a plain-text counter file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{StoreError, StoreResult};

/// Allocates monotonically increasing record ids.
///
/// The counter only ever grows. Deleting a record does not return its id to
/// the pool, so an id handed out once is never handed out again.
pub struct IdAllocator {
    path: PathBuf,
    counter: u64,
}

impl IdAllocator {
    /// Load the allocator from its counter file, trimming whitespace before
    /// parsing. A missing or unparseable file starts the counter at 0.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let counter = match fs::read_to_string(&path) {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "counter file unparseable, restarting at 0"
                    );
                    0
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "counter file unreadable, restarting at 0"
                );
                0
            }
        };
        Self { path, counter }
    }

    /// Highest id handed out so far.
    pub fn current(&self) -> u64 {
        self.counter
    }

    /// Persist and return the next id. The in-memory counter advances only
    /// once the new value is on disk.
    pub fn next_id(&mut self) -> StoreResult<u64> {
        let next = self.counter + 1;
        fs::write(&self.path, next.to_string()).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.counter = next;
        Ok(next)
    }
}
