use std::future::Future;

use super::{open_row, TestResult, KEY_COLUMN, TABLE};
use crate::record::Fields;
use crate::{RecordStore, StorageError};

pub(super) async fn run_lookup_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn(Vec<Fields>) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "lookup",
            "fetch_single_match",
            fetch_single_match(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "fetch_no_match_is_not_found",
            fetch_no_match_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "fetch_duplicate_key_is_ambiguous",
            fetch_duplicate_key_is_ambiguous(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "fetch_unknown_table_is_not_found",
            fetch_unknown_table_is_not_found(factory).await,
        ),
    ]
}

async fn fetch_single_match<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Vec<Fields>) -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory(vec![open_row("alpha"), open_row("beta")]).await;
    let record = store
        .fetch_by_key(TABLE, KEY_COLUMN, "beta")
        .await
        .map_err(|e| format!("fetch: {e}"))?;

    match record.fields.get(KEY_COLUMN) {
        Some(serde_json::Value::String(k)) if k == "beta" => Ok(()),
        other => Err(format!("expected key 'beta', got {other:?}")),
    }
}

async fn fetch_no_match_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Vec<Fields>) -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory(vec![open_row("alpha")]).await;
    match store.fetch_by_key(TABLE, KEY_COLUMN, "gamma").await {
        Err(StorageError::NotFound { key, .. }) if key == "gamma" => Ok(()),
        Err(e) => Err(format!("expected NotFound, got {e}")),
        Ok(r) => Err(format!("expected NotFound, got record {}", r.id)),
    }
}

async fn fetch_duplicate_key_is_ambiguous<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Vec<Fields>) -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory(vec![open_row("dup"), open_row("dup"), open_row("x")]).await;
    match store.fetch_by_key(TABLE, KEY_COLUMN, "dup").await {
        Err(StorageError::Ambiguous { count: 2, .. }) => Ok(()),
        Err(e) => Err(format!("expected Ambiguous with count 2, got {e}")),
        Ok(r) => Err(format!("expected Ambiguous, got record {}", r.id)),
    }
}

async fn fetch_unknown_table_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Vec<Fields>) -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory(vec![open_row("alpha")]).await;
    match store.fetch_by_key("NoSuchTable", KEY_COLUMN, "alpha").await {
        Err(StorageError::NotFound { .. }) | Err(StorageError::Backend(_)) => Ok(()),
        Err(e) => Err(format!("expected NotFound or Backend, got {e}")),
        Ok(r) => Err(format!("expected an error, got record {}", r.id)),
    }
}
