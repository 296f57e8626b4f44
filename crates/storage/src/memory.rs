//! In-process record store.
//!
//! Holds every table in a single `tokio::sync::Mutex`, which makes the
//! guarded update a true compare-and-set. Used by tests and for local
//! development without a Grist document.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::record::{ColumnUpdates, Fields, RecordId, RecordSnapshot};
use crate::traits::RecordStore;

/// Records keyed by table name, in insertion order within a table.
type Tables = BTreeMap<String, Vec<RecordSnapshot>>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to `table`, assigning the next free id of that table.
    pub async fn insert(&self, table: &str, fields: Fields) -> RecordId {
        let mut tables = self.tables.lock().await;
        let rows = tables.entry(table.to_string()).or_default();
        let next = rows.iter().map(|r| r.id.0).max().unwrap_or(0) + 1;
        let id = RecordId(next);
        rows.push(RecordSnapshot::new(id, fields));
        id
    }

    /// Read a record by id without going through a key lookup.
    pub async fn get(&self, table: &str, id: RecordId) -> Option<RecordSnapshot> {
        let tables = self.tables.lock().await;
        tables
            .get(table)
            .and_then(|rows| rows.iter().find(|r| r.id == id))
            .cloned()
    }
}

fn key_matches(value: Option<&serde_json::Value>, key: &str) -> bool {
    match value {
        Some(serde_json::Value::String(s)) => s == key,
        Some(serde_json::Value::Number(n)) => n.to_string() == key,
        _ => false,
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_by_key(
        &self,
        table: &str,
        key_column: &str,
        key: &str,
    ) -> Result<RecordSnapshot, StorageError> {
        let tables = self.tables.lock().await;
        let matches: Vec<&RecordSnapshot> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| key_matches(r.fields.get(key_column), key))
                    .collect()
            })
            .unwrap_or_default();

        match matches.as_slice() {
            [] => Err(StorageError::NotFound {
                table: table.to_string(),
                key_column: key_column.to_string(),
                key: key.to_string(),
            }),
            [record] => Ok((*record).clone()),
            many => Err(StorageError::Ambiguous {
                table: table.to_string(),
                key_column: key_column.to_string(),
                key: key.to_string(),
                count: many.len(),
            }),
        }
    }

    async fn apply_column_updates(
        &self,
        table: &str,
        id: RecordId,
        guard_column: &str,
        updates: ColumnUpdates,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().await;
        let record = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| {
                StorageError::Backend(format!("record {} not found in {}", id, table))
            })?;

        if record.is_set(guard_column) {
            return Err(StorageError::AlreadyAnswered {
                table: table.to_string(),
                record_id: id,
                guard_column: guard_column.to_string(),
            });
        }

        record.fields.extend(updates);
        Ok(())
    }
}
