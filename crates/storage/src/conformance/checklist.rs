use std::future::Future;

use super::{seed_instance, seed_transition, TestResult};
use crate::LifecycleStorage;

pub(super) async fn run_checklist_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "checklist",
        "upsert_creates_row_lazily",
        upsert_creates_row_lazily(factory).await,
    ));
    results.push(TestResult::from_result(
        "checklist",
        "no_rows_yields_empty_list",
        no_rows_yields_empty_list(factory).await,
    ));
    results.push(TestResult::from_result(
        "checklist",
        "second_upsert_overwrites_same_key",
        second_upsert_overwrites_same_key(factory).await,
    ));
    results.push(TestResult::from_result(
        "checklist",
        "rows_scoped_per_state",
        rows_scoped_per_state(factory).await,
    ));
    results.push(TestResult::from_result(
        "checklist",
        "revisit_overwrites_state_scope",
        revisit_overwrites_state_scope(factory).await,
    ));
    results.push(TestResult::from_result(
        "checklist",
        "rows_scoped_per_instance",
        rows_scoped_per_instance(factory).await,
    ));
    results.push(TestResult::from_result(
        "checklist",
        "delete_removes_all_scopes_for_instance",
        delete_removes_all_scopes_for_instance(factory).await,
    ));
    results.push(TestResult::from_result(
        "checklist",
        "delete_with_no_rows_returns_zero",
        delete_with_no_rows_returns_zero(factory).await,
    ));

    results
}

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn set_item<S: LifecycleStorage>(
    storage: &S,
    instance_id: &str,
    state: &str,
    item_name: &str,
    checked: bool,
    user: &str,
) -> Result<(), String> {
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .upsert_checklist_item(&mut snap, instance_id, state, item_name, checked, user)
        .await
        .map_err(|e| format!("upsert {item_name}: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit upsert: {e}"))?;
    Ok(())
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn upsert_creates_row_lazily<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    set_item(&s, "inst-1", "Created", "codeReviewed", true, "bob").await?;

    let items = s
        .list_checklist_items("inst-1", "Created")
        .await
        .map_err(|e| e.to_string())?;
    if items.len() != 1 {
        return Err(format!("expected 1 row, got {}", items.len()));
    }
    let row = &items[0];
    if row.item_name != "codeReviewed" || !row.checked || row.updated_by != "bob" {
        return Err(format!("unexpected row contents: {row:?}"));
    }
    Ok(())
}

async fn no_rows_yields_empty_list<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;

    let items = s
        .list_checklist_items("inst-1", "Created")
        .await
        .map_err(|e| e.to_string())?;
    if !items.is_empty() {
        return Err(format!("expected no rows, got {}", items.len()));
    }
    Ok(())
}

/// Writing the same (instance, state, item) key twice keeps one row with
/// the latest value and user.
async fn second_upsert_overwrites_same_key<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    set_item(&s, "inst-1", "Created", "codeReviewed", true, "bob").await?;
    set_item(&s, "inst-1", "Created", "codeReviewed", false, "carol").await?;

    let items = s
        .list_checklist_items("inst-1", "Created")
        .await
        .map_err(|e| e.to_string())?;
    if items.len() != 1 {
        return Err(format!("expected 1 row after overwrite, got {}", items.len()));
    }
    if items[0].checked {
        return Err("expected overwritten value false".to_string());
    }
    if items[0].updated_by != "carol" {
        return Err(format!(
            "expected updated_by carol, got {}",
            items[0].updated_by
        ));
    }
    Ok(())
}

/// The same item name under two different states is two distinct rows.
async fn rows_scoped_per_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    set_item(&s, "inst-1", "Created", "reviewed", true, "bob").await?;
    set_item(&s, "inst-1", "Testing", "reviewed", false, "bob").await?;

    let created = s
        .list_checklist_items("inst-1", "Created")
        .await
        .map_err(|e| e.to_string())?;
    let testing = s
        .list_checklist_items("inst-1", "Testing")
        .await
        .map_err(|e| e.to_string())?;
    if created.len() != 1 || testing.len() != 1 {
        return Err(format!(
            "expected 1 row per scope, got {}/{}",
            created.len(),
            testing.len()
        ));
    }
    if !created[0].checked || testing[0].checked {
        return Err("state scopes bled into each other".to_string());
    }
    Ok(())
}

/// Passing through the same state twice reuses the same scope key: the
/// second visit's write overwrites the first visit's row.
async fn revisit_overwrites_state_scope<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    seed_transition(&s, "inst-1", "Created", "Testing", "bob").await?;
    set_item(&s, "inst-1", "Testing", "reviewed", true, "bob").await?;

    // Leave Testing and come back.
    seed_transition(&s, "inst-1", "Testing", "Created", "bob").await?;
    seed_transition(&s, "inst-1", "Created", "Testing", "bob").await?;
    set_item(&s, "inst-1", "Testing", "reviewed", false, "carol").await?;

    let items = s
        .list_checklist_items("inst-1", "Testing")
        .await
        .map_err(|e| e.to_string())?;
    if items.len() != 1 {
        return Err(format!(
            "expected a single row across revisits, got {}",
            items.len()
        ));
    }
    if items[0].checked {
        return Err("expected second visit's write to win".to_string());
    }
    Ok(())
}

async fn rows_scoped_per_instance<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    seed_instance(&s, "inst-2").await?;
    set_item(&s, "inst-1", "Created", "reviewed", true, "bob").await?;

    let other = s
        .list_checklist_items("inst-2", "Created")
        .await
        .map_err(|e| e.to_string())?;
    if !other.is_empty() {
        return Err("checklist rows leaked across instances".to_string());
    }
    Ok(())
}

/// delete_checklist_items clears every state scope of the instance and
/// reports the row count.
async fn delete_removes_all_scopes_for_instance<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_instance(&s, "inst-1").await?;
    set_item(&s, "inst-1", "Created", "reviewed", true, "bob").await?;
    set_item(&s, "inst-1", "Testing", "unitTestsPassed", true, "bob").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let purged = s
        .delete_checklist_items(&mut snap, "inst-1")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if purged != 2 {
        return Err(format!("expected 2 purged rows, got {purged}"));
    }
    for state in ["Created", "Testing"] {
        let items = s
            .list_checklist_items("inst-1", state)
            .await
            .map_err(|e| e.to_string())?;
        if !items.is_empty() {
            return Err(format!("rows remain under {state} after purge"));
        }
    }
    Ok(())
}

async fn delete_with_no_rows_returns_zero<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LifecycleStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let purged = s
        .delete_checklist_items(&mut snap, "no-such-id")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if purged != 0 {
        return Err(format!("expected 0 purged rows, got {purged}"));
    }
    Ok(())
}
