//! Patient record engine.
//!
//! Core of a patient management service: validated records with derived
//! fields (BMI, BMI class, referral classification), sequential id
//! allocation, flat-file persistence, and sorted listing. The HTTP routing
//! layer sits outside this crate; it hands in plain inputs and maps the
//! typed errors onto protocol responses.
//!
//! # Architecture
//!
//! ```text
//!                 routing layer (not this crate)
//!                              │
//!                              ▼
//!                       PatientService          ── add / view_all /
//!                  (RwLock over shared state)      view_by_id / update /
//!                              │                   delete
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!       models              query               store
//!   validate input      sort by field       records JSON file
//!   derive bmi etc.     asc/desc            counter file
//!   check uniqueness                        (IdAllocator)
//! ```
//!
//! # Modules
//!
//! - [`models`]: `Patient`, inputs, validation and derived fields
//! - [`store`]: flat-file record map and id counter
//! - [`query`]: sort keys, order, stable sorting

pub mod models;
pub mod query;
pub mod store;

// Re-export commonly used types
pub use models::{BmiClass, ModelError, NewPatient, Patient, PatientUpdate, Referral};
pub use query::{QueryError, SortKey, SortOrder};
pub use store::{FileStore, IdAllocator, StoreError};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

// =========================================================================
// Error Taxonomy
// =========================================================================

/// Failures an operation can report. All are local to a single request;
/// none terminate the process, and none carry protocol status codes.
#[derive(Debug, thiserror::Error)]
pub enum PmsError {
    /// Referenced record absent, or the store empty on a listing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Structural constraint violated, or an unrecognized sort key/order.
    #[error("{0}")]
    Validation(String),

    /// Email or phone collides with another stored record.
    #[error("duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    /// Derived-field computation impossible from the given input.
    #[error("{0}")]
    Computation(String),

    /// Backing file could not be written. Load-side problems recover to an
    /// empty store instead of surfacing here.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl PmsError {
    fn not_found(id: u64) -> Self {
        PmsError::NotFound(format!("patient {id}"))
    }
}

impl From<ModelError> for PmsError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Validation { field, reason } => {
                PmsError::Validation(format!("invalid {field}: {reason}"))
            }
            ModelError::Duplicate { field, value } => PmsError::Duplicate { field, value },
            e @ ModelError::Computation(_) => PmsError::Computation(e.to_string()),
        }
    }
}

impl From<QueryError> for PmsError {
    fn from(e: QueryError) -> Self {
        PmsError::Validation(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PmsError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        PmsError::Persistence(StoreError::Poisoned(e.to_string()))
    }
}

// =========================================================================
// Service Façade
// =========================================================================

struct State {
    records: BTreeMap<u64, Patient>,
    store: FileStore,
    allocator: IdAllocator,
}

impl State {
    fn get(&self, id: u64) -> Result<&Patient, PmsError> {
        self.records.get(&id).ok_or_else(|| PmsError::not_found(id))
    }

    fn contains(&self, id: u64) -> bool {
        self.records.contains_key(&id)
    }
}

/// Thread-safe service object owning the record map and the id counter.
///
/// Readers share the lock; every mutating operation holds it exclusively
/// for the whole validate → mutate → persist sequence, so a uniqueness
/// check and its commit are atomic with respect to other writers. Memory
/// is updated only after the file write succeeds, keeping in-memory and
/// on-disk state from diverging on a failed save.
pub struct PatientService {
    state: RwLock<State>,
}

impl PatientService {
    /// Open the service over its two backing files, loading whatever state
    /// they hold. A missing or corrupt records file starts the store empty;
    /// a missing or corrupt counter file starts the allocator at 0.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(records_path: P, counter_path: Q) -> Self {
        let store = FileStore::new(records_path);
        let records = store.load();
        let allocator = IdAllocator::load(counter_path);
        tracing::debug!(
            count = records.len(),
            counter = allocator.current(),
            "patient service opened"
        );
        Self {
            state: RwLock::new(State {
                records,
                store,
                allocator,
            }),
        }
    }

    /// Create a record: validate, check uniqueness, derive, allocate an id,
    /// persist, then commit to memory. The counter file is written before
    /// the records file; if the records write fails, the advanced counter
    /// leaves only an unused id behind.
    pub fn add(&self, input: NewPatient) -> Result<(u64, Patient), PmsError> {
        let mut state = self.state.write()?;

        input.validate()?;
        models::check_unique(&state.records, &input.email, &input.phone, None)?;
        let record = Patient::derive(input)?;

        let id = state.allocator.next_id()?;
        let mut records = state.records.clone();
        records.insert(id, record.clone());
        state.store.save(&records)?;
        state.records = records;

        tracing::debug!(id, "patient added");
        Ok((id, record))
    }

    /// List every record, sorted. Fails `NotFound` when the store is empty
    /// and `Validation` on an unrecognized sort key or order.
    pub fn view_all(
        &self,
        sort_by: Option<&str>,
        order: Option<&str>,
    ) -> Result<Vec<(u64, Patient)>, PmsError> {
        let key = match sort_by {
            Some(s) => s.parse::<SortKey>()?,
            None => SortKey::default(),
        };
        let order = match order {
            Some(s) => s.parse::<SortOrder>()?,
            None => SortOrder::default(),
        };

        let state = self.state.read()?;
        if state.records.is_empty() {
            return Err(PmsError::NotFound("no patients recorded".into()));
        }
        Ok(query::sort_records(&state.records, key, order))
    }

    /// Fetch one record by id.
    pub fn view_by_id(&self, id: u64) -> Result<Patient, PmsError> {
        let state = self.state.read()?;
        Ok(state.get(id)?.clone())
    }

    /// Merge the given fields over an existing record, revalidate with the
    /// record excluded from its own uniqueness check, recompute derived
    /// fields, persist, then commit to memory.
    pub fn update(&self, id: u64, update: PatientUpdate) -> Result<Patient, PmsError> {
        let mut state = self.state.write()?;

        let merged = state.get(id)?.merged_with(update);
        merged.validate()?;
        models::check_unique(&state.records, &merged.email, &merged.phone, Some(id))?;
        let record = Patient::derive(merged)?;

        let mut records = state.records.clone();
        records.insert(id, record.clone());
        state.store.save(&records)?;
        state.records = records;

        tracing::debug!(id, "patient updated");
        Ok(record)
    }

    /// Remove a record and persist. Ids are never reused, so the counter
    /// is left alone.
    pub fn delete(&self, id: u64) -> Result<(), PmsError> {
        let mut state = self.state.write()?;

        if !state.contains(id) {
            return Err(PmsError::not_found(id));
        }
        let mut records = state.records.clone();
        records.remove(&id);
        state.store.save(&records)?;
        state.records = records;

        tracing::debug!(id, "patient deleted");
        Ok(())
    }
}
