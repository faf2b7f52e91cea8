use std::future::Future;

use super::{seed_instance, TestResult};
use crate::{LifecycleStorage, StorageError};

pub(super) async fn run_dissociate_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "dissociate",
        "delete_state_removes_record",
        delete_state_removes_record(factory).await,
    ));
    results.push(TestResult::from_result(
        "dissociate",
        "delete_state_nonexistent_is_not_an_error",
        delete_state_nonexistent_is_not_an_error(factory).await,
    ));
    results.push(TestResult::from_result(
        "dissociate",
        "delete_then_delete_again_reports_false",
        delete_then_delete_again_reports_false(factory).await,
    ));
    results.push(TestResult::from_result(
        "dissociate",
        "deleted_id_can_be_reassociated",
        deleted_id_can_be_reassociated(factory).await,
    ));
    results.push(TestResult::from_result(
        "dissociate",
        "delete_removes_id_from_listing",
        delete_removes_id_from_listing(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn delete_state_removes_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let deleted = s
        .delete_state(&mut snap, "inst-1")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if !deleted {
        return Err("expected delete_state to report true".to_string());
    }
    match s.get_state("inst-1").await {
        Err(StorageError::InstanceNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected InstanceNotFound, got: {e}")),
        Ok(_) => Err("record still readable after committed delete".to_string()),
    }
}

/// Deleting an id that never existed reports false, not an error.
async fn delete_state_nonexistent_is_not_an_error<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let deleted = s
        .delete_state(&mut snap, "no-such-id")
        .await
        .map_err(|e| format!("delete of missing id must not error: {e}"))?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if deleted {
        return Err("expected false for a missing id".to_string());
    }
    Ok(())
}

async fn delete_then_delete_again_reports_false<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.delete_state(&mut snap, "inst-1")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let second = s
        .delete_state(&mut snap, "inst-1")
        .await
        .map_err(|e| format!("second delete must not error: {e}"))?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if second {
        return Err("second delete reported a removed row".to_string());
    }
    Ok(())
}

/// Once deleted, the id is free again: a fresh association under the same
/// id must succeed.
async fn deleted_id_can_be_reassociated<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.delete_state(&mut snap, "inst-1")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_state(&mut snap, "inst-1", "appLifecycle", "Draft", "dave")
        .await
        .map_err(|e| format!("reassociation failed: {e}"))?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s.get_state("inst-1").await.map_err(|e| e.to_string())?;
    if rec.lifecycle_name != "appLifecycle" || rec.current_state != "Draft" {
        return Err(format!(
            "expected appLifecycle/Draft, got {}/{}",
            rec.lifecycle_name, rec.current_state
        ));
    }
    Ok(())
}

async fn delete_removes_id_from_listing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    seed_instance(&s, "inst-2").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.delete_state(&mut snap, "inst-1")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let ids = s
        .list_instance_ids("Created", "apiLifecycle")
        .await
        .map_err(|e| e.to_string())?;
    if ids != vec!["inst-2".to_string()] {
        return Err(format!("expected [inst-2], got {ids:?}"));
    }
    Ok(())
}
