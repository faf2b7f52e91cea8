//! Conformance test suite for `LifecycleStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `LifecycleStorage` implementation can run to verify correctness. The
//! suite covers:
//!
//! - **Association**: state record creation, duplicate detection
//! - **Snapshot isolation**: uncommitted writes invisible, committed writes visible
//! - **Atomic commit**: all-or-nothing semantics for state update + history append
//! - **Stale-state detection**: optimistic compare-and-update conflict shapes
//! - **History**: append-only ordering, seq tie-break, empty history
//! - **Checklist**: upsert, per-state scoping, overwrite on revisit, bulk delete
//! - **Dissociation**: delete semantics, zero-rows-is-success
//! - **Concurrency**: exactly-one-wins races, no false conflicts
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function
//! that creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use lcm_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_storage().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod associate;
mod checklist;
mod commit;
mod concurrent;
mod dissociate;
mod history;
mod snapshot;
mod stale;

use std::fmt;
use std::future::Future;

use crate::LifecycleStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "associate", "snapshot", "commit").
    pub category: String,
    /// Test name (e.g. "associate_creates_record_at_initial_state").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
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

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh,
/// empty storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(associate::run_associate_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(stale::run_stale_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(history::run_history_tests(&factory).await);
    results.extend(checklist::run_checklist_tests(&factory).await);
    results.extend(dissociate::run_dissociate_tests(&factory).await);
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

// ── Helpers shared across categories ─────────────────────────────────────────

/// Associate one instance ("apiLifecycle"/"Created" by "alice") and commit.
async fn seed_instance<S: LifecycleStorage>(storage: &S, instance_id: &str) -> Result<(), String> {
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_state(&mut snap, instance_id, "apiLifecycle", "Created", "alice")
        .await
        .map_err(|e| format!("insert_state {instance_id}: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit seed: {e}"))?;
    Ok(())
}

/// Apply one transition (state update + history event) in a single
/// committed snapshot.
async fn seed_transition<S: LifecycleStorage>(
    storage: &S,
    instance_id: &str,
    from: &str,
    to: &str,
    user: &str,
) -> Result<(), String> {
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .update_state(&mut snap, instance_id, from, to, user)
        .await
        .map_err(|e| format!("update {from}->{to}: {e}"))?;
    storage
        .insert_transition_event(&mut snap, instance_id, from, to, user)
        .await
        .map_err(|e| format!("event {from}->{to}: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit transition: {e}"))?;
    Ok(())
}
