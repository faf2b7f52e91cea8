use std::future::Future;

use super::{seed_instance, seed_transition, TestResult};
use crate::LifecycleStorage;

pub(super) async fn run_history_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "history",
        "no_transitions_yields_empty_history",
        no_transitions_yields_empty_history(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "events_ordered_oldest_first",
        events_ordered_oldest_first(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "seq_strictly_increases",
        seq_strictly_increases(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "event_carries_user_verbatim",
        event_carries_user_verbatim(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "histories_are_per_instance",
        histories_are_per_instance(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "history_survives_state_delete",
        history_survives_state_delete(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// A freshly associated instance has no history — empty vec, not an error.
async fn no_transitions_yields_empty_history<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    let events = s
        .list_transition_events("inst-1")
        .await
        .map_err(|e| e.to_string())?;
    if !events.is_empty() {
        return Err(format!("expected empty history, got {} events", events.len()));
    }
    Ok(())
}

/// Created -> Testing -> Published must come back as exactly those two
/// events in that order.
async fn events_ordered_oldest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    seed_transition(&s, "inst-1", "Created", "Testing", "bob").await?;
    seed_transition(&s, "inst-1", "Testing", "Published", "carol").await?;

    let events = s
        .list_transition_events("inst-1")
        .await
        .map_err(|e| e.to_string())?;
    if events.len() != 2 {
        return Err(format!("expected 2 events, got {}", events.len()));
    }
    if events[0].previous_state != "Created" || events[0].post_state != "Testing" {
        return Err(format!(
            "first event: expected Created->Testing, got {}->{}",
            events[0].previous_state, events[0].post_state
        ));
    }
    if events[1].previous_state != "Testing" || events[1].post_state != "Published" {
        return Err(format!(
            "second event: expected Testing->Published, got {}->{}",
            events[1].previous_state, events[1].post_state
        ));
    }
    if events[0].recorded_at > events[1].recorded_at {
        return Err("timestamps not non-decreasing".to_string());
    }
    Ok(())
}

/// seq is the insertion-order tie-break: it must strictly increase even
/// when two events share a clock tick.
async fn seq_strictly_increases<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    // Three events in a single snapshot land in the same instant on fast
    // backends; seq alone must keep them ordered.
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_transition_event(&mut snap, "inst-1", "Created", "Testing", "bob")
        .await
        .map_err(|e| e.to_string())?;
    s.insert_transition_event(&mut snap, "inst-1", "Testing", "Published", "bob")
        .await
        .map_err(|e| e.to_string())?;
    s.insert_transition_event(&mut snap, "inst-1", "Published", "Deprecated", "bob")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let events = s
        .list_transition_events("inst-1")
        .await
        .map_err(|e| e.to_string())?;
    if events.len() != 3 {
        return Err(format!("expected 3 events, got {}", events.len()));
    }
    for pair in events.windows(2) {
        if pair[0].seq >= pair[1].seq {
            return Err(format!(
                "seq not strictly increasing: {} then {}",
                pair[0].seq, pair[1].seq
            ));
        }
    }
    if events[2].post_state != "Deprecated" {
        return Err(format!(
            "expected last event post_state Deprecated, got {}",
            events[2].post_state
        ));
    }
    Ok(())
}

/// The user attribute is opaque: stored and returned verbatim.
async fn event_carries_user_verbatim<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    seed_transition(&s, "inst-1", "Created", "Testing", "svc:deploy-bot/7 ").await?;

    let events = s
        .list_transition_events("inst-1")
        .await
        .map_err(|e| e.to_string())?;
    if events.len() != 1 {
        return Err(format!("expected 1 event, got {}", events.len()));
    }
    if events[0].user != "svc:deploy-bot/7 " {
        return Err(format!("user not verbatim: got '{}'", events[0].user));
    }
    Ok(())
}

/// Events for one instance never appear in another instance's history.
async fn histories_are_per_instance<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    seed_instance(&s, "inst-2").await?;
    seed_transition(&s, "inst-1", "Created", "Testing", "bob").await?;

    let events = s
        .list_transition_events("inst-2")
        .await
        .map_err(|e| e.to_string())?;
    if !events.is_empty() {
        return Err(format!(
            "inst-2 must have empty history, got {} events",
            events.len()
        ));
    }
    Ok(())
}

/// Deleting the state record must not touch the audit trail.
async fn history_survives_state_delete<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    seed_transition(&s, "inst-1", "Created", "Testing", "bob").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.delete_state(&mut snap, "inst-1")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let events = s
        .list_transition_events("inst-1")
        .await
        .map_err(|e| e.to_string())?;
    if events.len() != 1 {
        return Err(format!(
            "expected history retained after delete, got {} events",
            events.len()
        ));
    }
    Ok(())
}
