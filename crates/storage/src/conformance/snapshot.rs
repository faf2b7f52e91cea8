use std::future::Future;

use super::{seed_instance, TestResult};
use crate::{LifecycleStorage, StorageError};

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "snapshot",
        "begin_commit_empty_snapshot_succeeds",
        begin_commit_empty_snapshot_succeeds(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "insert_not_visible_before_commit",
        insert_not_visible_before_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "insert_visible_after_commit",
        insert_visible_after_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "insert_not_visible_after_abort",
        insert_not_visible_after_abort(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "update_not_visible_before_commit",
        update_not_visible_before_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "update_rolled_back_on_abort",
        update_rolled_back_on_abort(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "dropped_snapshot_rolls_back",
        dropped_snapshot_rolls_back(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "snapshot_reads_its_own_writes",
        snapshot_reads_its_own_writes(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "sequential_snapshots_see_prior_commits",
        sequential_snapshots_see_prior_commits(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn begin_commit_empty_snapshot_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))
}

/// While a snapshot holding an insert is still open, read-path queries
/// must not see the new instance.
async fn insert_not_visible_before_commit<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let result = s.get_state("inst-1").await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::InstanceNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected InstanceNotFound, got: {e}")),
        Ok(_) => Err("instance must not be visible before commit".to_string()),
    }
}

async fn insert_visible_after_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    s.get_state("inst-1").await.map_err(|e| e.to_string())?;
    Ok(())
}

async fn insert_not_visible_after_abort<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match s.get_state("inst-1").await {
        Err(StorageError::InstanceNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected InstanceNotFound, got: {e}")),
        Ok(_) => Err("instance must not be visible after abort".to_string()),
    }
}

/// An uncommitted state update must not leak to read-path queries.
async fn update_not_visible_before_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_state(&mut snap, "inst-1", "Created", "Testing", "bob")
        .await
        .map_err(|e| e.to_string())?;

    let rec = s.get_state("inst-1").await.map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    if rec.current_state != "Created" {
        return Err(format!(
            "uncommitted update leaked: expected Created, got {}",
            rec.current_state
        ));
    }
    Ok(())
}

async fn update_rolled_back_on_abort<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_state(&mut snap, "inst-1", "Created", "Testing", "bob")
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s.get_state("inst-1").await.map_err(|e| e.to_string())?;
    if rec.current_state != "Created" {
        return Err(format!(
            "aborted update persisted: expected Created, got {}",
            rec.current_state
        ));
    }
    if rec.updated_by != "alice" {
        return Err(format!(
            "aborted update restamped metadata: expected alice, got {}",
            rec.updated_by
        ));
    }
    Ok(())
}

/// Dropping a snapshot without commit must roll back, exactly like an
/// explicit abort.
async fn dropped_snapshot_rolls_back<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        s.update_state(&mut snap, "inst-1", "Created", "Testing", "bob")
            .await
            .map_err(|e| e.to_string())?;
        drop(snap);
    }

    let rec = s.get_state("inst-1").await.map_err(|e| e.to_string())?;
    if rec.current_state != "Created" {
        return Err(format!(
            "dropped snapshot persisted its update: expected Created, got {}",
            rec.current_state
        ));
    }
    Ok(())
}

/// The locking read inside a snapshot must observe that snapshot's own
/// earlier writes.
async fn snapshot_reads_its_own_writes<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let rec = s
        .get_state_for_update(&mut snap, "inst-1")
        .await
        .map_err(|e| format!("own write invisible to locking read: {e}"))?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if rec.current_state != "Created" {
        return Err(format!("expected Created, got {}", rec.current_state));
    }
    Ok(())
}

async fn sequential_snapshots_see_prior_commits<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let rec = s
        .get_state_for_update(&mut snap, "inst-1")
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    if rec.current_state != "Created" {
        return Err(format!("expected Created, got {}", rec.current_state));
    }
    Ok(())
}
