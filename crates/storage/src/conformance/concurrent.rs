use std::future::Future;
use std::sync::Arc;

use super::{open_row, TestResult, GUARD_COLUMN, KEY_COLUMN, TABLE};
use crate::record::{ColumnUpdates, Fields};
use crate::{RecordStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn(Vec<Fields>) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "racing_submissions_exactly_one_wins",
            racing_submissions_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "racing_submissions_different_records_all_succeed",
            racing_submissions_different_records_all_succeed(factory).await,
        ),
    ]
}

// ── Same record: exactly one wins ────────────────────────────────────────────

/// N tasks all read the same unanswered record and try to answer it.
/// Exactly one update lands; the rest must get AlreadyAnswered.
async fn racing_submissions_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Vec<Fields>) -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory(vec![open_row("alpha")]).await);
    let record = store
        .fetch_by_key(TABLE, KEY_COLUMN, "alpha")
        .await
        .map_err(|e| format!("fetch: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        let id = record.id;
        handles.push(tokio::spawn(async move {
            let mut updates = ColumnUpdates::new();
            updates.insert(GUARD_COLUMN.to_string(), serde_json::json!(i as f64));
            updates.insert("Name".to_string(), serde_json::json!(format!("writer-{i}")));
            match s.apply_column_updates(TABLE, id, GUARD_COLUMN, updates).await {
                Ok(()) => Ok(true),
                Err(StorageError::AlreadyAnswered { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }

    Ok(())
}

// ── Different records: all succeed ───────────────────────────────────────────

/// N tasks each answer a different record. All should succeed; no false
/// conflicts when there is no contention.
async fn racing_submissions_different_records_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Vec<Fields>) -> Fut,
    Fut: Future<Output = S>,
{
    let rows = (0..N).map(|i| open_row(&format!("key-{i}"))).collect();
    let store = Arc::new(factory(rows).await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            let record = s.fetch_by_key(TABLE, KEY_COLUMN, &format!("key-{i}")).await?;
            let mut updates = ColumnUpdates::new();
            updates.insert(GUARD_COLUMN.to_string(), serde_json::json!(1.0));
            s.apply_column_updates(TABLE, record.id, GUARD_COLUMN, updates)
                .await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("unexpected failure: {e}"))?;
    }

    Ok(())
}
