use std::future::Future;

use super::{seed_instance, seed_transition, TestResult};
use crate::{LifecycleStorage, StorageError};

pub(super) async fn run_stale_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "stale",
        "update_with_matching_state_succeeds",
        update_with_matching_state_succeeds(factory).await,
    ));
    results.push(TestResult::from_result(
        "stale",
        "sequential_updates_follow_current_state",
        sequential_updates_follow_current_state(factory).await,
    ));
    results.push(TestResult::from_result(
        "stale",
        "update_with_wrong_state_returns_stale",
        update_with_wrong_state_returns_stale(factory).await,
    ));
    results.push(TestResult::from_result(
        "stale",
        "stale_error_has_correct_fields",
        stale_error_has_correct_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "stale",
        "stale_after_intervening_commit",
        stale_after_intervening_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "stale",
        "update_restamps_update_metadata_only",
        update_restamps_update_metadata_only(factory).await,
    ));
    results.push(TestResult::from_result(
        "stale",
        "update_nonexistent_returns_not_found",
        update_nonexistent_returns_not_found(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn update_with_matching_state_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    seed_transition(&s, "inst-1", "Created", "Testing", "bob").await?;

    let rec = s.get_state("inst-1").await.map_err(|e| e.to_string())?;
    if rec.current_state != "Testing" {
        return Err(format!("expected Testing, got {}", rec.current_state));
    }
    Ok(())
}

/// A chain of updates each conditioned on the real current state must all
/// apply: Created -> Testing -> Published.
async fn sequential_updates_follow_current_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    seed_transition(&s, "inst-1", "Created", "Testing", "bob").await?;
    seed_transition(&s, "inst-1", "Testing", "Published", "carol").await?;

    let rec = s.get_state("inst-1").await.map_err(|e| e.to_string())?;
    if rec.current_state != "Published" {
        return Err(format!("expected Published, got {}", rec.current_state));
    }
    Ok(())
}

async fn update_with_wrong_state_returns_stale<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_state(&mut snap, "inst-1", "Testing", "Published", "bob")
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::StaleState { .. }) => Ok(()),
        Err(e) => Err(format!("expected StaleState, got: {e}")),
        Ok(()) => Err("expected StaleState error, but got Ok".to_string()),
    }
}

/// The StaleState error must carry the instance id and the state the
/// caller conditioned on.
async fn stale_error_has_correct_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_state(&mut snap, "inst-1", "Testing", "Published", "bob")
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::StaleState {
            instance_id,
            expected_state,
        }) => {
            if instance_id != "inst-1" {
                return Err(format!("expected instance_id inst-1, got {instance_id}"));
            }
            if expected_state != "Testing" {
                return Err(format!("expected expected_state Testing, got {expected_state}"));
            }
            Ok(())
        }
        Err(e) => Err(format!("expected StaleState, got: {e}")),
        Ok(()) => Err("expected StaleState error, but got Ok".to_string()),
    }
}

/// After another transaction moves the state and commits, an update still
/// conditioned on the old state must fail stale.
async fn stale_after_intervening_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    seed_transition(&s, "inst-1", "Created", "Testing", "bob").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_state(&mut snap, "inst-1", "Created", "Deprecated", "carol")
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::StaleState { .. }) => Ok(()),
        Err(e) => Err(format!("expected StaleState, got: {e}")),
        Ok(()) => Err("expected StaleState error, but got Ok".to_string()),
    }
}

/// An update restamps updated_by/updated_at but never touches creation
/// metadata.
async fn update_restamps_update_metadata_only<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    seed_transition(&s, "inst-1", "Created", "Testing", "bob").await?;

    let rec = s.get_state("inst-1").await.map_err(|e| e.to_string())?;
    if rec.created_by != "alice" {
        return Err(format!("created_by changed: expected alice, got {}", rec.created_by));
    }
    if rec.updated_by != "bob" {
        return Err(format!("updated_by not restamped: expected bob, got {}", rec.updated_by));
    }
    Ok(())
}

async fn update_nonexistent_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_state(&mut snap, "no-such-id", "Created", "Testing", "bob")
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::InstanceNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected InstanceNotFound, got: {e}")),
        Ok(()) => Err("expected InstanceNotFound error, but got Ok".to_string()),
    }
}
