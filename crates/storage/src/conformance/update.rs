use std::future::Future;

use super::{answered_row, open_row, TestResult, GUARD_COLUMN, KEY_COLUMN, TABLE};
use crate::record::{ColumnUpdates, Fields};
use crate::{RecordStore, StorageError};

pub(super) async fn run_update_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn(Vec<Fields>) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "update",
            "guarded_update_applies_when_unset",
            guarded_update_applies_when_unset(factory).await,
        ),
        TestResult::from_result(
            "update",
            "guarded_update_rejected_when_set",
            guarded_update_rejected_when_set(factory).await,
        ),
        TestResult::from_result(
            "update",
            "second_update_is_rejected",
            second_update_is_rejected(factory).await,
        ),
        TestResult::from_result(
            "update",
            "update_leaves_other_columns_alone",
            update_leaves_other_columns_alone(factory).await,
        ),
    ]
}

fn answer(name: &str) -> ColumnUpdates {
    let mut updates = ColumnUpdates::new();
    updates.insert(GUARD_COLUMN.to_string(), serde_json::json!(1_700_000_100.5));
    updates.insert("Name".to_string(), serde_json::json!(name));
    updates
}

async fn guarded_update_applies_when_unset<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Vec<Fields>) -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory(vec![open_row("alpha")]).await;
    let before = store
        .fetch_by_key(TABLE, KEY_COLUMN, "alpha")
        .await
        .map_err(|e| format!("fetch: {e}"))?;
    store
        .apply_column_updates(TABLE, before.id, GUARD_COLUMN, answer("Ada"))
        .await
        .map_err(|e| format!("update: {e}"))?;

    let after = store
        .fetch_by_key(TABLE, KEY_COLUMN, "alpha")
        .await
        .map_err(|e| format!("refetch: {e}"))?;
    if !after.is_set(GUARD_COLUMN) {
        return Err("guard column still unset after update".to_string());
    }
    if after.fields.get("Name") != Some(&serde_json::json!("Ada")) {
        return Err(format!("Name not updated: {:?}", after.fields.get("Name")));
    }
    Ok(())
}

async fn guarded_update_rejected_when_set<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Vec<Fields>) -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory(vec![answered_row("alpha")]).await;
    let before = store
        .fetch_by_key(TABLE, KEY_COLUMN, "alpha")
        .await
        .map_err(|e| format!("fetch: {e}"))?;

    match store
        .apply_column_updates(TABLE, before.id, GUARD_COLUMN, answer("Eve"))
        .await
    {
        Err(StorageError::AlreadyAnswered { record_id, .. }) if record_id == before.id => {}
        Err(e) => return Err(format!("expected AlreadyAnswered, got {e}")),
        Ok(()) => return Err("expected AlreadyAnswered, update succeeded".to_string()),
    }

    let after = store
        .fetch_by_key(TABLE, KEY_COLUMN, "alpha")
        .await
        .map_err(|e| format!("refetch: {e}"))?;
    if after != before {
        return Err("rejected update modified the record".to_string());
    }
    Ok(())
}

async fn second_update_is_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Vec<Fields>) -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory(vec![open_row("alpha")]).await;
    let record = store
        .fetch_by_key(TABLE, KEY_COLUMN, "alpha")
        .await
        .map_err(|e| format!("fetch: {e}"))?;

    store
        .apply_column_updates(TABLE, record.id, GUARD_COLUMN, answer("Ada"))
        .await
        .map_err(|e| format!("first update: {e}"))?;

    match store
        .apply_column_updates(TABLE, record.id, GUARD_COLUMN, answer("Eve"))
        .await
    {
        Err(StorageError::AlreadyAnswered { .. }) => {}
        Err(e) => return Err(format!("expected AlreadyAnswered, got {e}")),
        Ok(()) => return Err("second update on a stale snapshot succeeded".to_string()),
    }

    let after = store
        .fetch_by_key(TABLE, KEY_COLUMN, "alpha")
        .await
        .map_err(|e| format!("refetch: {e}"))?;
    if after.fields.get("Name") != Some(&serde_json::json!("Ada")) {
        return Err("losing update overwrote the winner".to_string());
    }
    Ok(())
}

async fn update_leaves_other_columns_alone<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Vec<Fields>) -> Fut,
    Fut: Future<Output = S>,
{
    let mut row = open_row("alpha");
    row.insert("Email".to_string(), serde_json::json!("ada@example.org"));
    let store = factory(vec![row]).await;
    let record = store
        .fetch_by_key(TABLE, KEY_COLUMN, "alpha")
        .await
        .map_err(|e| format!("fetch: {e}"))?;

    store
        .apply_column_updates(TABLE, record.id, GUARD_COLUMN, answer("Ada"))
        .await
        .map_err(|e| format!("update: {e}"))?;

    let after = store
        .fetch_by_key(TABLE, KEY_COLUMN, "alpha")
        .await
        .map_err(|e| format!("refetch: {e}"))?;
    if after.fields.get("Email") != Some(&serde_json::json!("ada@example.org")) {
        return Err("untouched column changed".to_string());
    }
    Ok(())
}
