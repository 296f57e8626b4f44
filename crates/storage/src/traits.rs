use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{ColumnUpdates, RecordId, RecordSnapshot};

/// The storage trait for fillform record backends.
///
/// A `RecordStore` resolves a personalized link key to exactly one record
/// and applies the column updates produced by an accepted submission.
///
/// ## Lookup
///
/// `fetch_by_key` must distinguish three outcomes: no match
/// (`StorageError::NotFound`), more than one match
/// (`StorageError::Ambiguous`), and exactly one match (`Ok`).
///
/// ## Conditional update
///
/// `apply_column_updates` is guarded on `guard_column` (the form's response
/// time column). The update must only be applied while that column is still
/// null on the stored record; otherwise the method returns
/// `Err(StorageError::AlreadyAnswered)` and nothing is written. This is what
/// turns the "answer at most once" rule into a guarantee when two
/// submissions for the same record race each other.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Fetch the single record of `table` whose `key_column` equals `key`.
    async fn fetch_by_key(
        &self,
        table: &str,
        key_column: &str,
        key: &str,
    ) -> Result<RecordSnapshot, StorageError>;

    /// Apply `updates` to record `id` of `table` if `guard_column` is unset.
    async fn apply_column_updates(
        &self,
        table: &str,
        id: RecordId,
        guard_column: &str,
        updates: ColumnUpdates,
    ) -> Result<(), StorageError>;
}
