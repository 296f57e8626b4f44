use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Weakly typed field bag as delivered by the backing store.
///
/// Column names map to whatever JSON value the store holds for them; no
/// schema is imposed at this boundary.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// Store-assigned row identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A point-in-time read of one backing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub id: RecordId,
    pub fields: Fields,
}

impl RecordSnapshot {
    pub fn new(id: RecordId, fields: Fields) -> Self {
        RecordSnapshot { id, fields }
    }

    /// True when `column` holds a non-null value.
    ///
    /// An absent column counts as unset.
    pub fn is_set(&self, column: &str) -> bool {
        self.fields
            .get(column)
            .is_some_and(|value| !value.is_null())
    }
}

/// Column name to new value, as handed to `RecordStore::apply_column_updates`.
pub type ColumnUpdates = BTreeMap<String, serde_json::Value>;
