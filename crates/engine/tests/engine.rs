//! Integration tests for the lifecycle engine over the reference
//! in-memory backend.
//!
//! Covers the full operation surface: association (generated and
//! caller-supplied ids), optimistically validated transitions and their
//! audit trail, checklist scoping, dissociation semantics, and the
//! concurrent exactly-one-wins guarantee.

use std::sync::Arc;

use lcm_engine::{LifecycleEngine, LifecycleError};
use lcm_storage::memory::MemoryStorage;

fn engine() -> LifecycleEngine<MemoryStorage> {
    LifecycleEngine::new(Arc::new(MemoryStorage::new()))
}

// ── End-to-end scenario ──────────────────────────────────────────────────────

/// associate -> transition -> stale retry rejected -> checklist -> history.
#[tokio::test]
async fn full_lifecycle_scenario() {
    let engine = engine();

    let id = engine
        .associate("apiLifecycle", "Created", "alice")
        .await
        .unwrap();

    engine
        .transition("Created", "Testing", &id, "bob")
        .await
        .unwrap();
    let state = engine.get_state(&id).await.unwrap();
    assert_eq!(state.current_state, "Testing");

    // carol read "Created" before bob's transition landed; her request is
    // now stale and must be rejected without touching anything.
    let err = engine
        .transition("Created", "Testing", &id, "carol")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::StaleState { .. }), "got: {err}");

    engine
        .set_checklist_item(&id, "Testing", "unitTestsPassed", true, "bob")
        .await
        .unwrap();
    let checklist = engine.get_checklist_state(&id, "Testing").await.unwrap();
    assert_eq!(checklist.item("unitTestsPassed"), Some(true));
    assert_eq!(checklist.record.current_state, "Testing");

    let history = engine.get_history(&id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].previous_state, "Created");
    assert_eq!(history[0].post_state, "Testing");
    assert_eq!(history[0].user, "bob");
}

// ── Association ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn associate_generates_distinct_ids() {
    let engine = engine();
    let a = engine
        .associate("apiLifecycle", "Created", "alice")
        .await
        .unwrap();
    let b = engine
        .associate("apiLifecycle", "Created", "alice")
        .await
        .unwrap();
    assert_ne!(a, b);

    let rec = engine.get_state(&a).await.unwrap();
    assert_eq!(rec.lifecycle_name, "apiLifecycle");
    assert_eq!(rec.current_state, "Created");
    assert_eq!(rec.created_by, "alice");
}

#[tokio::test]
async fn associate_with_caller_supplied_id() {
    let engine = engine();
    engine
        .associate_with_id("appLifecycle", "app-42", "Draft", "alice")
        .await
        .unwrap();
    let rec = engine.get_state("app-42").await.unwrap();
    assert_eq!(rec.instance_id, "app-42");
    assert_eq!(rec.current_state, "Draft");
}

#[tokio::test]
async fn associate_with_colliding_id_fails() {
    let engine = engine();
    engine
        .associate_with_id("apiLifecycle", "api-1", "Created", "alice")
        .await
        .unwrap();

    let err = engine
        .associate_with_id("apiLifecycle", "api-1", "Created", "bob")
        .await
        .unwrap_err();
    match err {
        LifecycleError::DuplicateInstance { instance_id } => assert_eq!(instance_id, "api-1"),
        other => panic!("expected DuplicateInstance, got: {other}"),
    }

    // The original association is untouched.
    let rec = engine.get_state("api-1").await.unwrap();
    assert_eq!(rec.created_by, "alice");
}

// ── Transitions ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn transition_chain_builds_ordered_history() {
    let engine = engine();
    let id = engine
        .associate("apiLifecycle", "Created", "alice")
        .await
        .unwrap();

    engine
        .transition("Created", "Testing", &id, "bob")
        .await
        .unwrap();
    engine
        .transition("Testing", "Published", &id, "carol")
        .await
        .unwrap();

    let history = engine.get_history(&id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(
        (history[0].previous_state.as_str(), history[0].post_state.as_str()),
        ("Created", "Testing")
    );
    assert_eq!(
        (history[1].previous_state.as_str(), history[1].post_state.as_str()),
        ("Testing", "Published")
    );
    assert!(history[0].recorded_at <= history[1].recorded_at);
    assert!(history[0].seq < history[1].seq);
}

#[tokio::test]
async fn stale_transition_leaves_no_trace() {
    let engine = engine();
    let id = engine
        .associate("apiLifecycle", "Created", "alice")
        .await
        .unwrap();
    engine
        .transition("Created", "Testing", &id, "bob")
        .await
        .unwrap();

    let err = engine
        .transition("Created", "Deprecated", &id, "carol")
        .await
        .unwrap_err();
    match err {
        LifecycleError::StaleState {
            instance_id,
            expected_state,
        } => {
            assert_eq!(instance_id, id);
            assert_eq!(expected_state, "Created");
        }
        other => panic!("expected StaleState, got: {other}"),
    }

    // No state change and no phantom history row from the rejected call.
    assert_eq!(engine.get_state(&id).await.unwrap().current_state, "Testing");
    assert_eq!(engine.get_history(&id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn transition_on_missing_instance_is_not_found() {
    let engine = engine();
    let err = engine
        .transition("Created", "Testing", "no-such-id", "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }), "got: {err}");
}

/// N concurrent transitions racing from the same prior state: exactly
/// one wins, the rest observe StaleState, and the final state is a single
/// attempted target.
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_transitions_exactly_one_wins() {
    let engine = engine();
    let id = engine
        .associate("apiLifecycle", "Created", "alice")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = engine.clone();
        let id = id.clone();
        let target = if i % 2 == 0 { "Testing" } else { "Deprecated" };
        handles.push(tokio::spawn(async move {
            engine
                .transition("Created", target, &id, &format!("user-{i}"))
                .await
        }));
    }

    let mut winners = 0;
    let mut stale = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => winners += 1,
            Err(LifecycleError::StaleState { .. }) => stale += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(stale, 7);

    let state = engine.get_state(&id).await.unwrap().current_state;
    assert!(state == "Testing" || state == "Deprecated", "got: {state}");
    let history = engine.get_history(&id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].post_state, state);
}

// ── Checklist ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn checklist_items_scoped_per_state() {
    let engine = engine();
    let id = engine
        .associate("apiLifecycle", "Created", "alice")
        .await
        .unwrap();

    engine
        .set_checklist_item(&id, "Created", "reviewed", true, "bob")
        .await
        .unwrap();
    engine
        .set_checklist_item(&id, "Testing", "reviewed", false, "bob")
        .await
        .unwrap();

    let created = engine.get_checklist_state(&id, "Created").await.unwrap();
    let testing = engine.get_checklist_state(&id, "Testing").await.unwrap();
    assert_eq!(created.item("reviewed"), Some(true));
    assert_eq!(testing.item("reviewed"), Some(false));
    assert_eq!(created.item("neverSet"), None);
}

/// Checklist rows are keyed per
/// (instance, state), so revisiting a state overwrites the earlier
/// visit's value.
#[tokio::test]
async fn revisiting_a_state_overwrites_checklist_value() {
    let engine = engine();
    let id = engine
        .associate("apiLifecycle", "Created", "alice")
        .await
        .unwrap();

    engine
        .transition("Created", "Testing", &id, "bob")
        .await
        .unwrap();
    engine
        .set_checklist_item(&id, "Testing", "reviewed", true, "bob")
        .await
        .unwrap();

    // Go back and revisit Testing.
    engine
        .transition("Testing", "Created", &id, "bob")
        .await
        .unwrap();
    engine
        .transition("Created", "Testing", &id, "bob")
        .await
        .unwrap();
    engine
        .set_checklist_item(&id, "Testing", "reviewed", false, "carol")
        .await
        .unwrap();

    let checklist = engine.get_checklist_state(&id, "Testing").await.unwrap();
    assert_eq!(checklist.items.len(), 1);
    assert_eq!(checklist.item("reviewed"), Some(false));
    assert_eq!(checklist.items[0].updated_by, "carol");
}

#[tokio::test]
async fn set_checklist_item_requires_live_instance() {
    let engine = engine();
    let err = engine
        .set_checklist_item("no-such-id", "Testing", "reviewed", true, "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }), "got: {err}");
}

#[tokio::test]
async fn get_checklist_state_on_missing_instance_is_not_found() {
    let engine = engine();
    let err = engine
        .get_checklist_state("no-such-id", "Testing")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }), "got: {err}");
}

// ── Dissociation ─────────────────────────────────────────────────────────────

/// Dissociate purges checklist rows but preserves the audit history.
#[tokio::test]
async fn dissociate_purges_checklist_and_preserves_history() {
    let engine = engine();
    let id = engine
        .associate("apiLifecycle", "Created", "alice")
        .await
        .unwrap();
    engine
        .transition("Created", "Testing", &id, "bob")
        .await
        .unwrap();
    engine
        .set_checklist_item(&id, "Testing", "unitTestsPassed", true, "bob")
        .await
        .unwrap();

    engine.dissociate(&id).await.unwrap();

    let err = engine.get_state(&id).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }), "got: {err}");
    let err = engine
        .get_checklist_state(&id, "Testing")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }), "got: {err}");

    // The audit trail outlives the instance.
    let history = engine.get_history(&id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].post_state, "Testing");
}

/// Dissociating twice: the second call is a quiet no-op.
#[tokio::test]
async fn dissociate_is_repeatable() {
    let engine = engine();
    let id = engine
        .associate("apiLifecycle", "Created", "alice")
        .await
        .unwrap();

    engine.dissociate(&id).await.unwrap();
    engine.dissociate(&id).await.unwrap();
    engine.dissociate("never-existed").await.unwrap();
}

// ── Queries ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_state_on_missing_instance_is_not_found() {
    let engine = engine();
    let err = engine.get_state("no-such-id").await.unwrap_err();
    match err {
        LifecycleError::NotFound { instance_id, .. } => assert_eq!(instance_id, "no-such-id"),
        other => panic!("expected NotFound, got: {other}"),
    }
}

#[tokio::test]
async fn history_is_empty_for_untransitioned_instance() {
    let engine = engine();
    let id = engine
        .associate("apiLifecycle", "Created", "alice")
        .await
        .unwrap();
    assert!(engine.get_history(&id).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_instance_ids_matches_state_and_lifecycle() {
    let engine = engine();
    engine
        .associate_with_id("apiLifecycle", "api-1", "Created", "alice")
        .await
        .unwrap();
    engine
        .associate_with_id("apiLifecycle", "api-2", "Created", "alice")
        .await
        .unwrap();
    engine
        .associate_with_id("appLifecycle", "app-1", "Created", "alice")
        .await
        .unwrap();
    engine
        .transition("Created", "Testing", "api-2", "bob")
        .await
        .unwrap();

    let ids = engine
        .list_instance_ids("Created", "apiLifecycle")
        .await
        .unwrap();
    assert_eq!(ids, vec!["api-1".to_string()]);

    let ids = engine
        .list_instance_ids("Testing", "apiLifecycle")
        .await
        .unwrap();
    assert_eq!(ids, vec!["api-2".to_string()]);

    assert!(engine
        .list_instance_ids("Published", "apiLifecycle")
        .await
        .unwrap()
        .is_empty());
}
