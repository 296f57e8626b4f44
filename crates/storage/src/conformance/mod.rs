//! Conformance test suite for `RecordStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `RecordStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Lookup**: single match, no match, ambiguous match
//! - **Guarded update**: updates land while the guard column is unset and are
//!   rejected once it is set
//! - **Concurrency**: racing guarded updates on one record have exactly one
//!   winner
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory that creates
//! a fresh store whose table `TABLE` holds the given rows:
//!
//! ```ignore
//! use fillform_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn grist_conformance() {
//!     let report = run_conformance_suite(|rows| async move {
//!         create_scratch_grist_table(rows).await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod lookup;
mod update;

use std::fmt;
use std::future::Future;

use crate::record::Fields;
use crate::RecordStore;

/// Table name every conformance test seeds and queries.
pub const TABLE: &str = "Responses";

/// Key column of the seeded table.
pub const KEY_COLUMN: &str = "Key";

/// Guard column of the seeded table.
pub const GUARD_COLUMN: &str = "Answered_At";

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "lookup", "update").
    pub category: String,
    /// Test name (e.g. "fetch_single_match").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a record store.
///
/// The `factory` is called once per test with the rows to seed into
/// [`TABLE`], ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RecordStore,
    F: Fn(Vec<Fields>) -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(lookup::run_lookup_tests(&factory).await);
    results.extend(update::run_update_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: row constructors ────────────────────────────────────────────────

/// An unanswered row with the given key.
fn open_row(key: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert(KEY_COLUMN.to_string(), serde_json::json!(key));
    fields.insert(GUARD_COLUMN.to_string(), serde_json::Value::Null);
    fields.insert("Name".to_string(), serde_json::json!(""));
    fields
}

/// A row whose guard column is already set.
fn answered_row(key: &str) -> Fields {
    let mut fields = open_row(key);
    fields.insert(GUARD_COLUMN.to_string(), serde_json::json!(1_700_000_000.0));
    fields
}
