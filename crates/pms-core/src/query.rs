//! Sorting over the full record set.

use std::collections::BTreeMap;
use std::str::FromStr;

use thiserror::Error;

use crate::models::Patient;

/// Query-parsing errors. Unknown values are rejected, never silently
/// defaulted.
#[derive(Error, Debug, PartialEq)]
pub enum QueryError {
    #[error("unknown sort field: {0:?}")]
    UnknownKey(String),

    #[error("unknown sort order: {0:?} (expected \"asc\" or \"desc\")")]
    UnknownOrder(String),
}

/// Field a record listing can be sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Record id; the default when no field is given ("none" or "id").
    #[default]
    Id,
    Name,
    Age,
    Height,
    Weight,
    Bmi,
    ReferredBy,
}

impl FromStr for SortKey {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "id" => Ok(SortKey::Id),
            "name" => Ok(SortKey::Name),
            "age" => Ok(SortKey::Age),
            "height" => Ok(SortKey::Height),
            "weight" => Ok(SortKey::Weight),
            "bmi" => Ok(SortKey::Bmi),
            // accept the legacy misspelling as an alias
            "referred_by" | "refered_by" => Ok(SortKey::ReferredBy),
            other => Err(QueryError::UnknownKey(other.to_string())),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(QueryError::UnknownOrder(other.to_string())),
        }
    }
}

/// Sort the full record set.
///
/// The sort is stable over the map's ascending-id iteration, so equal keys
/// keep id order as the tie-break. Descending reverses the fully-sorted
/// ascending sequence rather than flipping the comparator, which keeps the
/// desc listing the exact mirror of asc.
pub fn sort_records(
    records: &BTreeMap<u64, Patient>,
    key: SortKey,
    order: SortOrder,
) -> Vec<(u64, Patient)> {
    let mut rows: Vec<(u64, Patient)> = records
        .iter()
        .map(|(id, patient)| (*id, patient.clone()))
        .collect();

    match key {
        // BTreeMap iteration is already ascending by id
        SortKey::Id => {}
        SortKey::Name => rows.sort_by(|a, b| a.1.name.cmp(&b.1.name)),
        SortKey::Age => rows.sort_by_key(|row| row.1.age),
        SortKey::Height => rows.sort_by(|a, b| a.1.height.total_cmp(&b.1.height)),
        SortKey::Weight => rows.sort_by(|a, b| a.1.weight.total_cmp(&b.1.weight)),
        SortKey::Bmi => rows.sort_by(|a, b| a.1.bmi.total_cmp(&b.1.bmi)),
        SortKey::ReferredBy => rows.sort_by_key(|row| row.1.referred_by.rank()),
    }

    if order == SortOrder::Desc {
        rows.reverse();
    }
    rows
}
