//! Grist REST record store.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. Talks to
//! `{root_url}/api/docs/{doc_id}/tables/{table}/records`.
//!
//! The Grist records API has no conditional PATCH. The guarded update
//! therefore re-reads the record by id right before writing, which narrows
//! the double-submission window to the time between that read and the PATCH
//! but does not close it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::record::{ColumnUpdates, Fields, RecordId, RecordSnapshot};
use crate::traits::RecordStore;

/// Connection settings for one Grist document.
#[derive(Debug, Clone)]
pub struct GristStore {
    root_url: String,
    api_key: String,
    doc_id: String,
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    records: Vec<GristRecord>,
}

#[derive(Debug, Deserialize, Serialize)]
struct GristRecord {
    id: i64,
    fields: Fields,
}

#[derive(Debug, Serialize)]
struct PatchRequest {
    records: Vec<GristRecord>,
}

impl GristStore {
    pub fn new(root_url: &str, api_key: &str, doc_id: &str) -> Self {
        GristStore {
            root_url: root_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            doc_id: doc_id.to_string(),
        }
    }

    /// URL of the records endpoint of `table`.
    pub fn records_url(&self, table: &str) -> String {
        format!(
            "{}/api/docs/{}/tables/{}/records",
            self.root_url, self.doc_id, table
        )
    }

    /// Grist filter parameter selecting rows whose `column` equals `value`.
    pub fn filter_param(column: &str, value: serde_json::Value) -> String {
        let mut filter = serde_json::Map::new();
        filter.insert(column.to_string(), serde_json::Value::Array(vec![value]));
        serde_json::Value::Object(filter).to_string()
    }

    fn get_records(&self, table: &str, filter: &str) -> Result<Vec<GristRecord>, StorageError> {
        let agent = ureq::Agent::new_with_defaults();
        let response = agent
            .get(&self.records_url(table))
            .query("filter", filter)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .call()
            .map_err(|e| StorageError::Backend(format!("GET {}: {}", table, e)))?;

        let body: RecordsResponse = response.into_body().read_json().map_err(|e| {
            StorageError::Backend(format!("failed to parse records of {}: {}", table, e))
        })?;
        Ok(body.records)
    }

    fn patch_record(
        &self,
        table: &str,
        id: RecordId,
        updates: ColumnUpdates,
    ) -> Result<(), StorageError> {
        let agent = ureq::Agent::new_with_defaults();
        let request = PatchRequest {
            records: vec![GristRecord {
                id: id.0,
                fields: updates,
            }],
        };
        agent
            .patch(&self.records_url(table))
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&request)
            .map_err(|e| StorageError::Backend(format!("PATCH {} {}: {}", table, id, e)))?;
        Ok(())
    }

    fn fetch_blocking(
        &self,
        table: &str,
        key_column: &str,
        key: &str,
    ) -> Result<RecordSnapshot, StorageError> {
        let filter = Self::filter_param(key_column, serde_json::json!(key));
        let mut records = self.get_records(table, &filter)?;
        match records.len() {
            0 => Err(StorageError::NotFound {
                table: table.to_string(),
                key_column: key_column.to_string(),
                key: key.to_string(),
            }),
            1 => {
                let record = records.remove(0);
                Ok(RecordSnapshot::new(RecordId(record.id), record.fields))
            }
            count => Err(StorageError::Ambiguous {
                table: table.to_string(),
                key_column: key_column.to_string(),
                key: key.to_string(),
                count,
            }),
        }
    }

    fn update_blocking(
        &self,
        table: &str,
        id: RecordId,
        guard_column: &str,
        updates: ColumnUpdates,
    ) -> Result<(), StorageError> {
        let filter = Self::filter_param("id", serde_json::json!(id.0));
        let current = self
            .get_records(table, &filter)?
            .into_iter()
            .next()
            .map(|r| RecordSnapshot::new(RecordId(r.id), r.fields))
            .ok_or_else(|| {
                StorageError::Backend(format!("record {} vanished from {}", id, table))
            })?;

        if current.is_set(guard_column) {
            return Err(StorageError::AlreadyAnswered {
                table: table.to_string(),
                record_id: id,
                guard_column: guard_column.to_string(),
            });
        }

        self.patch_record(table, id, updates)
    }
}

fn join_error(e: tokio::task::JoinError) -> StorageError {
    StorageError::Backend(format!("task join error: {}", e))
}

#[async_trait]
impl RecordStore for GristStore {
    async fn fetch_by_key(
        &self,
        table: &str,
        key_column: &str,
        key: &str,
    ) -> Result<RecordSnapshot, StorageError> {
        let store = self.clone();
        let (table, key_column, key) = (table.to_string(), key_column.to_string(), key.to_string());
        tracing::debug!(%table, %key_column, "fetching record from grist");
        tokio::task::spawn_blocking(move || store.fetch_blocking(&table, &key_column, &key))
            .await
            .map_err(join_error)?
    }

    async fn apply_column_updates(
        &self,
        table: &str,
        id: RecordId,
        guard_column: &str,
        updates: ColumnUpdates,
    ) -> Result<(), StorageError> {
        let store = self.clone();
        let (table, guard_column) = (table.to_string(), guard_column.to_string());
        tracing::debug!(%table, record = %id, columns = updates.len(), "patching grist record");
        tokio::task::spawn_blocking(move || {
            store.update_blocking(&table, id, &guard_column, updates)
        })
        .await
        .map_err(join_error)?
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
