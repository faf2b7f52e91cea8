use std::future::Future;

use super::{seed_instance, TestResult};
use crate::{LifecycleStorage, StorageError};

pub(super) async fn run_associate_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "associate",
        "insert_creates_record_at_initial_state",
        insert_creates_record_at_initial_state(factory).await,
    ));
    results.push(TestResult::from_result(
        "associate",
        "insert_stamps_creation_metadata",
        insert_stamps_creation_metadata(factory).await,
    ));
    results.push(TestResult::from_result(
        "associate",
        "double_insert_returns_already_associated",
        double_insert_returns_already_associated(factory).await,
    ));
    results.push(TestResult::from_result(
        "associate",
        "double_insert_across_snapshots",
        double_insert_across_snapshots(factory).await,
    ));
    results.push(TestResult::from_result(
        "associate",
        "already_associated_error_has_correct_id",
        already_associated_error_has_correct_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "associate",
        "different_instances_are_independent",
        different_instances_are_independent(factory).await,
    ));
    results.push(TestResult::from_result(
        "associate",
        "get_state_nonexistent_returns_not_found",
        get_state_nonexistent_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "associate",
        "get_state_for_update_nonexistent_returns_not_found",
        get_state_for_update_nonexistent_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "associate",
        "list_instance_ids_filters_by_state_and_lifecycle",
        list_instance_ids_filters_by_state_and_lifecycle(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// After insert + commit, the record holds the lifecycle name and the
/// initial state as its current state.
async fn insert_creates_record_at_initial_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    let rec = s.get_state("inst-1").await.map_err(|e| e.to_string())?;
    if rec.instance_id != "inst-1" {
        return Err(format!("expected instance_id inst-1, got {}", rec.instance_id));
    }
    if rec.lifecycle_name != "apiLifecycle" {
        return Err(format!(
            "expected lifecycle_name apiLifecycle, got {}",
            rec.lifecycle_name
        ));
    }
    if rec.current_state != "Created" {
        return Err(format!(
            "expected current_state Created, got {}",
            rec.current_state
        ));
    }
    Ok(())
}

/// A fresh record carries the associating user in both created_by and
/// updated_by, and non-empty timestamps.
async fn insert_stamps_creation_metadata<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    let rec = s.get_state("inst-1").await.map_err(|e| e.to_string())?;
    if rec.created_by != "alice" || rec.updated_by != "alice" {
        return Err(format!(
            "expected created_by/updated_by alice, got {}/{}",
            rec.created_by, rec.updated_by
        ));
    }
    if rec.created_at.is_empty() || rec.updated_at.is_empty() {
        return Err("expected non-empty timestamps".to_string());
    }
    Ok(())
}

/// Inserting the same instance twice in one snapshot must return
/// AlreadyAssociated.
async fn double_insert_returns_already_associated<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_state(&mut snap, "inst-1", "apiLifecycle", "Created", "alice")
        .await
        .map_err(|e| e.to_string())?;

    let result = s
        .insert_state(&mut snap, "inst-1", "apiLifecycle", "Created", "alice")
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::AlreadyAssociated { .. }) => Ok(()),
        Err(e) => Err(format!("expected AlreadyAssociated, got: {e}")),
        Ok(()) => Err("expected AlreadyAssociated error, but got Ok".to_string()),
    }
}

/// Inserting the same instance in a second snapshot after committing the
/// first must return AlreadyAssociated.
async fn double_insert_across_snapshots<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .insert_state(&mut snap, "inst-1", "appLifecycle", "Created", "bob")
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::AlreadyAssociated { .. }) => Ok(()),
        Err(e) => Err(format!("expected AlreadyAssociated, got: {e}")),
        Ok(()) => Err("expected AlreadyAssociated error, but got Ok".to_string()),
    }
}

/// The AlreadyAssociated error must carry the colliding instance id.
async fn already_associated_error_has_correct_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .insert_state(&mut snap, "inst-1", "apiLifecycle", "Created", "alice")
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::AlreadyAssociated { instance_id }) => {
            if instance_id != "inst-1" {
                return Err(format!("expected instance_id inst-1, got {instance_id}"));
            }
            Ok(())
        }
        Err(e) => Err(format!("expected AlreadyAssociated, got: {e}")),
        Ok(()) => Err("expected AlreadyAssociated error, but got Ok".to_string()),
    }
}

/// Distinct instance ids associate independently, even under different
/// lifecycle names.
async fn different_instances_are_independent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_state(&mut snap, "inst-1", "apiLifecycle", "Created", "alice")
        .await
        .map_err(|e| e.to_string())?;
    s.insert_state(&mut snap, "inst-2", "appLifecycle", "Draft", "bob")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec1 = s.get_state("inst-1").await.map_err(|e| e.to_string())?;
    let rec2 = s.get_state("inst-2").await.map_err(|e| e.to_string())?;
    if rec1.current_state != "Created" || rec2.current_state != "Draft" {
        return Err(format!(
            "expected Created/Draft, got {}/{}",
            rec1.current_state, rec2.current_state
        ));
    }
    Ok(())
}

/// get_state for an id that was never associated returns InstanceNotFound
/// with the requested id.
async fn get_state_nonexistent_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_state("no-such-id").await {
        Err(StorageError::InstanceNotFound { instance_id }) => {
            if instance_id != "no-such-id" {
                return Err(format!("expected id no-such-id, got {instance_id}"));
            }
            Ok(())
        }
        Err(e) => Err(format!("expected InstanceNotFound, got: {e}")),
        Ok(_) => Err("expected InstanceNotFound, but got a record".to_string()),
    }
}

/// The locking read reports InstanceNotFound the same way.
async fn get_state_for_update_nonexistent_returns_not_found<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.get_state_for_update(&mut snap, "no-such-id").await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::InstanceNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected InstanceNotFound, got: {e}")),
        Ok(_) => Err("expected InstanceNotFound, but got a record".to_string()),
    }
}

/// list_instance_ids returns exactly the ids whose current state and
/// lifecycle name both match.
async fn list_instance_ids_filters_by_state_and_lifecycle<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_state(&mut snap, "api-1", "apiLifecycle", "Created", "alice")
        .await
        .map_err(|e| e.to_string())?;
    s.insert_state(&mut snap, "api-2", "apiLifecycle", "Created", "alice")
        .await
        .map_err(|e| e.to_string())?;
    s.insert_state(&mut snap, "api-3", "apiLifecycle", "Testing", "alice")
        .await
        .map_err(|e| e.to_string())?;
    s.insert_state(&mut snap, "app-1", "appLifecycle", "Created", "alice")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut ids = s
        .list_instance_ids("Created", "apiLifecycle")
        .await
        .map_err(|e| e.to_string())?;
    ids.sort();
    if ids != vec!["api-1".to_string(), "api-2".to_string()] {
        return Err(format!("expected [api-1, api-2], got {ids:?}"));
    }

    let empty = s
        .list_instance_ids("Published", "apiLifecycle")
        .await
        .map_err(|e| e.to_string())?;
    if !empty.is_empty() {
        return Err(format!("expected no ids in Published, got {empty:?}"));
    }
    Ok(())
}
