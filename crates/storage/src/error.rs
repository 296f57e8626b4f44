use crate::record::RecordId;

/// All errors that can be returned by a RecordStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No record matched the lookup key.
    #[error("no record found in {table} where {key_column} = {key:?}")]
    NotFound {
        table: String,
        key_column: String,
        key: String,
    },

    /// More than one record matched the lookup key. Keys are expected to be
    /// unique, so this is an ambiguity in the backing data, not a user error.
    #[error("{count} records found in {table} where {key_column} = {key:?}")]
    Ambiguous {
        table: String,
        key_column: String,
        key: String,
        count: usize,
    },

    /// A conditional update was rejected because the guard column had
    /// already been set by the time the update was applied.
    #[error("record {record_id} in {table} already has {guard_column} set")]
    AlreadyAnswered {
        table: String,
        record_id: RecordId,
        guard_column: String,
    },

    /// A backend-specific storage error (HTTP transport, decoding, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
