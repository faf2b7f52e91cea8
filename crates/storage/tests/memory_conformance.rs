//! Runs the backend-agnostic conformance suite against the reference
//! in-memory backend.

use lcm_storage::conformance::run_conformance_suite;
use lcm_storage::memory::MemoryStorage;

#[tokio::test(flavor = "multi_thread")]
async fn memory_backend_passes_conformance() {
    let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
    assert_eq!(report.failed, 0, "{report}");
}
