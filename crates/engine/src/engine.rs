//! The lifecycle state engine.
//!
//! `LifecycleEngine` orchestrates the state, history, and checklist tables
//! behind a [`LifecycleStorage`] backend: it owns the transactional
//! boundaries (one snapshot per logical operation) and translates storage
//! errors into the [`LifecycleError`] taxonomy. It holds no mutable state
//! of its own beyond the injected backend, so a single engine value is
//! safe to share across concurrent callers.
//!
//! The engine deliberately does NOT validate transitions against a
//! lifecycle definition's state graph — that is the caller's
//! definition-evaluation layer. Its transition contract is purely "record
//! this state change atomically, conditioned on the expected prior state".

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use lcm_storage::{ChecklistItemRecord, LifecycleStorage, StateRecord, TransitionEventRecord};

use crate::error::LifecycleError;

/// A state record merged with the checklist rows of one state scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistState {
    pub record: StateRecord,
    /// The state scope the items were queried under.
    pub state: String,
    pub items: Vec<ChecklistItemRecord>,
}

impl ChecklistState {
    /// Completion flag for a named item; `None` if the item has never
    /// been set under this state scope.
    pub fn item(&self, item_name: &str) -> Option<bool> {
        self.items
            .iter()
            .find(|i| i.item_name == item_name)
            .map(|i| i.checked)
    }
}

/// The lifecycle state engine. Construct one over a storage backend and
/// share it freely; every operation is a single bounded transaction (or
/// plain read) against the store.
pub struct LifecycleEngine<S: LifecycleStorage> {
    storage: Arc<S>,
}

impl<S: LifecycleStorage> Clone for LifecycleEngine<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl<S: LifecycleStorage> LifecycleEngine<S> {
    /// Create an engine over an injected storage backend.
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Associate a new lifecycle instance and return its generated id.
    ///
    /// Sets `current_state = initial_state` and stamps creation metadata
    /// with `user`.
    pub async fn associate(
        &self,
        lifecycle_name: &str,
        initial_state: &str,
        user: &str,
    ) -> Result<String, LifecycleError> {
        let instance_id = Uuid::new_v4().to_string();
        self.associate_with_id(lifecycle_name, &instance_id, initial_state, user)
            .await?;
        Ok(instance_id)
    }

    /// Associate a new lifecycle instance under a caller-supplied id,
    /// for resources that pre-generate their own correlation key.
    ///
    /// Fails with [`LifecycleError::DuplicateInstance`] if the id is
    /// already associated.
    pub async fn associate_with_id(
        &self,
        lifecycle_name: &str,
        instance_id: &str,
        initial_state: &str,
        user: &str,
    ) -> Result<(), LifecycleError> {
        const OP: &str = "associate";
        let mut snap = self.begin(OP, instance_id).await?;
        if let Err(e) = self
            .storage
            .insert_state(&mut snap, instance_id, lifecycle_name, initial_state, user)
            .await
        {
            self.abort(snap).await;
            return Err(LifecycleError::from_storage(OP, instance_id, e));
        }
        self.commit(OP, instance_id, snap).await?;
        debug!(instance_id, lifecycle_name, initial_state, "lifecycle associated");
        Ok(())
    }

    /// Apply a state change, conditioned on `previous_state` being the
    /// instance's current state at commit time.
    ///
    /// The precondition check, the state update, and the history append
    /// execute as one transaction — a partially applied transition is
    /// never observable. On a concurrent-modification race the losing
    /// caller gets [`LifecycleError::StaleState`] and must re-read; the
    /// engine performs zero automatic retries.
    pub async fn transition(
        &self,
        previous_state: &str,
        required_state: &str,
        instance_id: &str,
        user: &str,
    ) -> Result<(), LifecycleError> {
        const OP: &str = "transition";
        let mut snap = self.begin(OP, instance_id).await?;

        // Locking read so the precondition holds until this snapshot
        // commits or aborts.
        let current = match self.storage.get_state_for_update(&mut snap, instance_id).await {
            Ok(rec) => rec,
            Err(e) => {
                self.abort(snap).await;
                return Err(LifecycleError::from_storage(OP, instance_id, e));
            }
        };
        if current.current_state != previous_state {
            self.abort(snap).await;
            warn!(
                instance_id,
                expected = previous_state,
                found = %current.current_state,
                "stale transition rejected"
            );
            return Err(LifecycleError::StaleState {
                instance_id: instance_id.to_string(),
                expected_state: previous_state.to_string(),
            });
        }

        if let Err(e) = self
            .storage
            .update_state(&mut snap, instance_id, previous_state, required_state, user)
            .await
        {
            self.abort(snap).await;
            return Err(LifecycleError::from_storage(OP, instance_id, e));
        }
        if let Err(e) = self
            .storage
            .insert_transition_event(&mut snap, instance_id, previous_state, required_state, user)
            .await
        {
            self.abort(snap).await;
            return Err(LifecycleError::from_storage(OP, instance_id, e));
        }

        self.commit(OP, instance_id, snap).await?;
        debug!(instance_id, previous_state, required_state, "lifecycle transitioned");
        Ok(())
    }

    /// Remove the instance's state record and purge its checklist rows.
    ///
    /// History is retained as the audit trail of record. Dissociating an
    /// id that does not exist is a successful no-op, so the call is safe
    /// to repeat.
    pub async fn dissociate(&self, instance_id: &str) -> Result<(), LifecycleError> {
        const OP: &str = "dissociate";
        let mut snap = self.begin(OP, instance_id).await?;
        if let Err(e) = self.storage.delete_checklist_items(&mut snap, instance_id).await {
            self.abort(snap).await;
            return Err(LifecycleError::from_storage(OP, instance_id, e));
        }
        let removed = match self.storage.delete_state(&mut snap, instance_id).await {
            Ok(removed) => removed,
            Err(e) => {
                self.abort(snap).await;
                return Err(LifecycleError::from_storage(OP, instance_id, e));
            }
        };
        self.commit(OP, instance_id, snap).await?;
        debug!(instance_id, removed, "lifecycle dissociated");
        Ok(())
    }

    /// Read the instance's current state record.
    pub async fn get_state(&self, instance_id: &str) -> Result<StateRecord, LifecycleError> {
        self.storage
            .get_state(instance_id)
            .await
            .map_err(|e| LifecycleError::from_storage("get_state", instance_id, e))
    }

    /// Read the state record merged with checklist completion for one
    /// state scope. The scope need not be the current state.
    pub async fn get_checklist_state(
        &self,
        instance_id: &str,
        state: &str,
    ) -> Result<ChecklistState, LifecycleError> {
        const OP: &str = "get_checklist_state";
        let record = self
            .storage
            .get_state(instance_id)
            .await
            .map_err(|e| LifecycleError::from_storage(OP, instance_id, e))?;
        let items = self
            .storage
            .list_checklist_items(instance_id, state)
            .await
            .map_err(|e| LifecycleError::from_storage(OP, instance_id, e))?;
        Ok(ChecklistState {
            record,
            state: state.to_string(),
            items,
        })
    }

    /// Upsert the checklist row keyed `(instance_id, state, item_name)`.
    ///
    /// The instance must exist (checklist rows never outlive or predate
    /// their instance), but `state` is NOT required to be the current
    /// state: the caller's definition layer owns that gating, and this
    /// engine trusts the scoping state it is given.
    pub async fn set_checklist_item(
        &self,
        instance_id: &str,
        state: &str,
        item_name: &str,
        value: bool,
        user: &str,
    ) -> Result<(), LifecycleError> {
        const OP: &str = "set_checklist_item";
        let mut snap = self.begin(OP, instance_id).await?;
        // Locking read: keeps the instance alive for the duration of the
        // upsert, upholding the no-orphaned-checklist-rows invariant.
        if let Err(e) = self.storage.get_state_for_update(&mut snap, instance_id).await {
            self.abort(snap).await;
            return Err(LifecycleError::from_storage(OP, instance_id, e));
        }
        if let Err(e) = self
            .storage
            .upsert_checklist_item(&mut snap, instance_id, state, item_name, value, user)
            .await
        {
            self.abort(snap).await;
            return Err(LifecycleError::from_storage(OP, instance_id, e));
        }
        self.commit(OP, instance_id, snap).await?;
        debug!(instance_id, state, item_name, value, "checklist item set");
        Ok(())
    }

    /// The instance's transition events, oldest first. An instance with
    /// no recorded transitions yields an empty vec, not an error.
    pub async fn get_history(
        &self,
        instance_id: &str,
    ) -> Result<Vec<TransitionEventRecord>, LifecycleError> {
        self.storage
            .list_transition_events(instance_id)
            .await
            .map_err(|e| LifecycleError::from_storage("get_history", instance_id, e))
    }

    /// Ids of all instances currently in `state` for `lifecycle_name`.
    /// No ordering guarantee.
    pub async fn list_instance_ids(
        &self,
        state: &str,
        lifecycle_name: &str,
    ) -> Result<Vec<String>, LifecycleError> {
        self.storage
            .list_instance_ids(state, lifecycle_name)
            .await
            .map_err(|e| LifecycleError::from_storage("list_instance_ids", "-", e))
    }

    // ── Snapshot plumbing ─────────────────────────────────────────────────────

    async fn begin(
        &self,
        operation: &'static str,
        instance_id: &str,
    ) -> Result<S::Snapshot, LifecycleError> {
        self.storage
            .begin_snapshot()
            .await
            .map_err(|e| LifecycleError::from_storage(operation, instance_id, e))
    }

    async fn commit(
        &self,
        operation: &'static str,
        instance_id: &str,
        snapshot: S::Snapshot,
    ) -> Result<(), LifecycleError> {
        self.storage
            .commit_snapshot(snapshot)
            .await
            .map_err(|e| LifecycleError::from_storage(operation, instance_id, e))
    }

    /// Best-effort rollback on an error path; the original error is the
    /// one worth surfacing, so an abort failure is only logged.
    async fn abort(&self, snapshot: S::Snapshot) {
        if let Err(e) = self.storage.abort_snapshot(snapshot).await {
            warn!(error = %e, "snapshot abort failed");
        }
    }
}
