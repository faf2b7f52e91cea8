//! Reference in-memory backend.
//!
//! `MemoryStorage` implements [`LifecycleStorage`] with real transaction
//! semantics so the conformance suite and engine tests exercise genuine
//! isolation rather than a pass-through mock:
//!
//! - a single writer token (held by the open snapshot) serializes writers,
//!   so a precondition observed inside a snapshot stays valid until that
//!   snapshot commits or aborts — the in-memory analogue of
//!   `SELECT ... FOR UPDATE`;
//! - each snapshot stages its mutations against a private copy of the
//!   tables and publishes them only at commit, so readers outside the
//!   snapshot never observe partial writes;
//! - aborting (or dropping) a snapshot discards the staged copy and
//!   releases the token.
//!
//! Writers serialize globally, which is coarse but correct. This backend
//! is intended for tests and single-process embedding, not as a durable
//! store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::StorageError;
use crate::record::{ChecklistItemRecord, StateRecord, TransitionEventRecord};
use crate::traits::LifecycleStorage;

/// The three logical tables plus the event sequence counter.
#[derive(Debug, Default, Clone)]
struct Tables {
    /// instance_id -> state record
    states: BTreeMap<String, StateRecord>,
    /// append-only, in commit order
    events: Vec<TransitionEventRecord>,
    /// (instance_id, state, item_name) -> checklist row
    checklist: BTreeMap<(String, String, String), ChecklistItemRecord>,
    next_seq: i64,
}

/// In-memory [`LifecycleStorage`] backend. Cheap to clone; clones share
/// the same underlying tables.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<Mutex<Tables>>,
    write_token: Arc<Mutex<()>>,
}

/// An open transaction against [`MemoryStorage`].
///
/// Holds the writer token for its whole lifetime; dropping the snapshot
/// releases the token and discards all staged writes.
pub struct MemorySnapshot {
    staged: Tables,
    _writer: OwnedMutexGuard<()>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LifecycleStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        // Token first: once held, no other writer can change the committed
        // tables, so the staged copy below stays consistent with them.
        let writer = self.write_token.clone().lock_owned().await;
        let staged = self.tables.lock().await.clone();
        Ok(MemorySnapshot {
            staged,
            _writer: writer,
        })
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        *self.tables.lock().await = snapshot.staged;
        Ok(())
    }

    async fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        drop(snapshot);
        Ok(())
    }

    async fn insert_state(
        &self,
        snapshot: &mut MemorySnapshot,
        instance_id: &str,
        lifecycle_name: &str,
        initial_state: &str,
        user: &str,
    ) -> Result<(), StorageError> {
        if snapshot.staged.states.contains_key(instance_id) {
            return Err(StorageError::AlreadyAssociated {
                instance_id: instance_id.to_string(),
            });
        }
        let now = now_rfc3339();
        snapshot.staged.states.insert(
            instance_id.to_string(),
            StateRecord {
                instance_id: instance_id.to_string(),
                lifecycle_name: lifecycle_name.to_string(),
                current_state: initial_state.to_string(),
                created_by: user.to_string(),
                created_at: now.clone(),
                updated_by: user.to_string(),
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn get_state_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        instance_id: &str,
    ) -> Result<StateRecord, StorageError> {
        snapshot
            .staged
            .states
            .get(instance_id)
            .cloned()
            .ok_or_else(|| StorageError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })
    }

    async fn update_state(
        &self,
        snapshot: &mut MemorySnapshot,
        instance_id: &str,
        expected_state: &str,
        new_state: &str,
        user: &str,
    ) -> Result<(), StorageError> {
        let record = snapshot
            .staged
            .states
            .get_mut(instance_id)
            .ok_or_else(|| StorageError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })?;
        if record.current_state != expected_state {
            return Err(StorageError::StaleState {
                instance_id: instance_id.to_string(),
                expected_state: expected_state.to_string(),
            });
        }
        record.current_state = new_state.to_string();
        record.updated_by = user.to_string();
        record.updated_at = now_rfc3339();
        Ok(())
    }

    async fn insert_transition_event(
        &self,
        snapshot: &mut MemorySnapshot,
        instance_id: &str,
        previous_state: &str,
        post_state: &str,
        user: &str,
    ) -> Result<(), StorageError> {
        let seq = snapshot.staged.next_seq;
        snapshot.staged.next_seq += 1;
        snapshot.staged.events.push(TransitionEventRecord {
            instance_id: instance_id.to_string(),
            previous_state: previous_state.to_string(),
            post_state: post_state.to_string(),
            user: user.to_string(),
            recorded_at: now_rfc3339(),
            seq,
        });
        Ok(())
    }

    async fn upsert_checklist_item(
        &self,
        snapshot: &mut MemorySnapshot,
        instance_id: &str,
        state: &str,
        item_name: &str,
        checked: bool,
        user: &str,
    ) -> Result<(), StorageError> {
        let key = (
            instance_id.to_string(),
            state.to_string(),
            item_name.to_string(),
        );
        snapshot.staged.checklist.insert(
            key,
            ChecklistItemRecord {
                instance_id: instance_id.to_string(),
                state: state.to_string(),
                item_name: item_name.to_string(),
                checked,
                updated_by: user.to_string(),
                updated_at: now_rfc3339(),
            },
        );
        Ok(())
    }

    async fn delete_state(
        &self,
        snapshot: &mut MemorySnapshot,
        instance_id: &str,
    ) -> Result<bool, StorageError> {
        Ok(snapshot.staged.states.remove(instance_id).is_some())
    }

    async fn delete_checklist_items(
        &self,
        snapshot: &mut MemorySnapshot,
        instance_id: &str,
    ) -> Result<u64, StorageError> {
        let before = snapshot.staged.checklist.len();
        snapshot
            .staged
            .checklist
            .retain(|(id, _, _), _| id != instance_id);
        Ok((before - snapshot.staged.checklist.len()) as u64)
    }

    async fn get_state(&self, instance_id: &str) -> Result<StateRecord, StorageError> {
        self.tables
            .lock()
            .await
            .states
            .get(instance_id)
            .cloned()
            .ok_or_else(|| StorageError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })
    }

    async fn list_checklist_items(
        &self,
        instance_id: &str,
        state: &str,
    ) -> Result<Vec<ChecklistItemRecord>, StorageError> {
        // BTreeMap iteration gives item_name order within the scope.
        Ok(self
            .tables
            .lock()
            .await
            .checklist
            .iter()
            .filter(|((id, st, _), _)| id == instance_id && st == state)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn list_transition_events(
        &self,
        instance_id: &str,
    ) -> Result<Vec<TransitionEventRecord>, StorageError> {
        // Events are stored in commit order; seq is assigned monotonically,
        // so a filtered scan is already (recorded_at, seq) ascending.
        Ok(self
            .tables
            .lock()
            .await
            .events
            .iter()
            .filter(|e| e.instance_id == instance_id)
            .cloned()
            .collect())
    }

    async fn list_instance_ids(
        &self,
        state: &str,
        lifecycle_name: &str,
    ) -> Result<Vec<String>, StorageError> {
        Ok(self
            .tables
            .lock()
            .await
            .states
            .values()
            .filter(|r| r.current_state == state && r.lifecycle_name == lifecycle_name)
            .map(|r| r.instance_id.clone())
            .collect())
    }
}

/// Generate a simple ISO 8601 timestamp from the system clock.
fn now_rfc3339() -> String {
    let now = time::OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.microsecond()
    )
}
