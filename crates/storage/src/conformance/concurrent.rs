use std::future::Future;
use std::sync::Arc;

use super::{seed_instance, TestResult};
use crate::{LifecycleStorage, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_exactly_one_wins",
        concurrent_updates_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_inserts_exactly_one_wins",
        concurrent_inserts_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_different_instances_all_succeed",
        concurrent_updates_different_instances_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_final_state_consistent",
        concurrent_updates_final_state_consistent(factory).await,
    ));

    results
}

/// Run one update attempt; returns Ok(true) if it won the race,
/// Ok(false) if it lost with StaleState.
///
/// A locking backend surfaces the conflict from `update_state`; a pure
/// OCC backend may only detect it at `commit_snapshot`. Both shapes are
/// conformant.
async fn try_transition<S: LifecycleStorage>(
    storage: &S,
    instance_id: &str,
    from: &str,
    to: &str,
    user: &str,
) -> Result<bool, StorageError> {
    let mut snap = storage.begin_snapshot().await?;
    match storage
        .update_state(&mut snap, instance_id, from, to, user)
        .await
    {
        Ok(()) => {}
        Err(StorageError::StaleState { .. }) => {
            storage.abort_snapshot(snap).await?;
            return Ok(false);
        }
        Err(e) => {
            let _ = storage.abort_snapshot(snap).await;
            return Err(e);
        }
    }
    storage
        .insert_transition_event(&mut snap, instance_id, from, to, user)
        .await?;
    match storage.commit_snapshot(snap).await {
        Ok(()) => Ok(true),
        Err(StorageError::StaleState { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

// ── Concurrent update: exactly one wins ─────────────────────────────────────

/// N tasks race to transition the same instance from "Created". Exactly
/// one commit succeeds; the rest must observe StaleState.
async fn concurrent_updates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed_instance(storage.as_ref(), "inst-1").await?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            try_transition(s.as_ref(), "inst-1", "Created", "Testing", &format!("user-{i}")).await
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

// ── Concurrent insert: exactly one wins ─────────────────────────────────────

/// N tasks race to associate the same caller-supplied id. Exactly one
/// succeeds; the rest must observe AlreadyAssociated.
async fn concurrent_inserts_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            match s
                .insert_state(&mut snap, "inst-1", "apiLifecycle", "Created", "alice")
                .await
            {
                Ok(()) => {
                    s.commit_snapshot(snap).await?;
                    Ok(true)
                }
                Err(StorageError::AlreadyAssociated { .. }) => {
                    s.abort_snapshot(snap).await?;
                    Ok(false)
                }
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    Err(e)
                }
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}

// ── Concurrent updates to different instances: all succeed ───────────────────

/// N tasks each transition a different instance. All must succeed — no
/// false conflicts when there is no contention.
async fn concurrent_updates_different_instances_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    for i in 0..N {
        seed_instance(storage.as_ref(), &format!("inst-{i}")).await?;
    }

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            try_transition(
                s.as_ref(),
                &format!("inst-{i}"),
                "Created",
                "Testing",
                "bob",
            )
            .await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let won = handle
            .await
            .map_err(|e| format!("task {i} panic: {e}"))?
            .map_err(|e| format!("task {i} failed: {e}"))?;
        if !won {
            return Err(format!("task {i} saw a false conflict"));
        }
    }

    for i in 0..N {
        let rec = storage
            .get_state(&format!("inst-{i}"))
            .await
            .map_err(|e| format!("get inst-{i}: {e}"))?;
        if rec.current_state != "Testing" {
            return Err(format!(
                "inst-{i}: expected Testing, got {}",
                rec.current_state
            ));
        }
    }
    Ok(())
}

// ── Concurrent updates: final state consistent ──────────────────────────────

/// After a race on the same instance, the final state must be one of the
/// attempted targets (never a partial value) and the history must hold
/// exactly the winner's event.
async fn concurrent_updates_final_state_consistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed_instance(storage.as_ref(), "inst-1").await?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        // Half the tasks target Testing, half Deprecated.
        let target = if i % 2 == 0 { "Testing" } else { "Deprecated" };
        handles.push(tokio::spawn(async move {
            try_transition(s.as_ref(), "inst-1", "Created", target, "bob").await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
    }

    let rec = storage
        .get_state("inst-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if rec.current_state != "Testing" && rec.current_state != "Deprecated" {
        return Err(format!(
            "final state must be Testing or Deprecated, got {}",
            rec.current_state
        ));
    }

    let events = storage
        .list_transition_events("inst-1")
        .await
        .map_err(|e| format!("history: {e}"))?;
    if events.len() != 1 {
        return Err(format!("expected exactly 1 history event, got {}", events.len()));
    }
    if events[0].post_state != rec.current_state {
        return Err(format!(
            "history event ({}) disagrees with final state ({})",
            events[0].post_state, rec.current_state
        ));
    }
    Ok(())
}
