use std::future::Future;

use super::{seed_instance, TestResult};
use crate::LifecycleStorage;

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "commit",
        "state_and_event_both_visible_after_commit",
        state_and_event_both_visible_after_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "state_and_event_neither_visible_after_abort",
        state_and_event_neither_visible_after_abort(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "multi_instance_snapshot_commits_atomically",
        multi_instance_snapshot_commits_atomically(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "checklist_and_state_share_commit_boundary",
        checklist_and_state_share_commit_boundary(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "delete_and_checklist_purge_commit_together",
        delete_and_checklist_purge_commit_together(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// The transition pattern — update_state plus insert_transition_event in
/// one snapshot — must land both writes on commit.
async fn state_and_event_both_visible_after_commit<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.insert_transition_event(&mut snap, "inst-1", "Created", "Testing", "bob")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s.get_state("inst-1").await.map_err(|e| e.to_string())?;
    if rec.current_state != "Testing" {
        return Err(format!("expected Testing, got {}", rec.current_state));
    }
    let events = s
        .list_transition_events("inst-1")
        .await
        .map_err(|e| e.to_string())?;
    if events.len() != 1 {
        return Err(format!("expected 1 event, got {}", events.len()));
    }
    if events[0].previous_state != "Created" || events[0].post_state != "Testing" {
        return Err(format!(
            "expected Created->Testing, got {}->{}",
            events[0].previous_state, events[0].post_state
        ));
    }
    Ok(())
}

/// Aborting the same pattern must leave neither the state change nor the
/// history row — no partial application.
async fn state_and_event_neither_visible_after_abort<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.insert_transition_event(&mut snap, "inst-1", "Created", "Testing", "bob")
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s.get_state("inst-1").await.map_err(|e| e.to_string())?;
    if rec.current_state != "Created" {
        return Err(format!(
            "state change survived abort: expected Created, got {}",
            rec.current_state
        ));
    }
    let events = s
        .list_transition_events("inst-1")
        .await
        .map_err(|e| e.to_string())?;
    if !events.is_empty() {
        return Err(format!(
            "history row survived abort: expected 0 events, got {}",
            events.len()
        ));
    }
    Ok(())
}

/// Writes touching several instances in one snapshot commit as a unit.
async fn multi_instance_snapshot_commits_atomically<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    seed_instance(&s, "inst-2").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_state(&mut snap, "inst-1", "Created", "Testing", "bob")
        .await
        .map_err(|e| e.to_string())?;
    s.update_state(&mut snap, "inst-2", "Created", "Deprecated", "bob")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec1 = s.get_state("inst-1").await.map_err(|e| e.to_string())?;
    let rec2 = s.get_state("inst-2").await.map_err(|e| e.to_string())?;
    if rec1.current_state != "Testing" || rec2.current_state != "Deprecated" {
        return Err(format!(
            "expected Testing/Deprecated, got {}/{}",
            rec1.current_state, rec2.current_state
        ));
    }
    Ok(())
}

/// A checklist upsert staged next to a state write follows the same
/// commit/abort boundary.
async fn checklist_and_state_share_commit_boundary<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    // Abort first: neither write may land.
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.upsert_checklist_item(&mut snap, "inst-1", "Created", "reviewed", true, "bob")
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let items = s
        .list_checklist_items("inst-1", "Created")
        .await
        .map_err(|e| e.to_string())?;
    if !items.is_empty() {
        return Err("aborted checklist upsert persisted".to_string());
    }

    // Then commit: the row must land.
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.upsert_checklist_item(&mut snap, "inst-1", "Created", "reviewed", true, "bob")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let items = s
        .list_checklist_items("inst-1", "Created")
        .await
        .map_err(|e| e.to_string())?;
    if items.len() != 1 || !items[0].checked {
        return Err(format!("expected one checked row, got {items:?}"));
    }
    Ok(())
}

/// The dissociate pattern — checklist purge plus state delete in one
/// snapshot — commits as a unit.
async fn delete_and_checklist_purge_commit_together<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.upsert_checklist_item(&mut snap, "inst-1", "Created", "reviewed", true, "bob")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let purged = s
        .delete_checklist_items(&mut snap, "inst-1")
        .await
        .map_err(|e| e.to_string())?;
    let deleted = s
        .delete_state(&mut snap, "inst-1")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if purged != 1 {
        return Err(format!("expected 1 purged checklist row, got {purged}"));
    }
    if !deleted {
        return Err("expected delete_state to report a removed row".to_string());
    }
    if s.get_state("inst-1").await.is_ok() {
        return Err("state record still visible after committed delete".to_string());
    }
    let items = s
        .list_checklist_items("inst-1", "Created")
        .await
        .map_err(|e| e.to_string())?;
    if !items.is_empty() {
        return Err("checklist rows still visible after committed purge".to_string());
    }
    Ok(())
}
