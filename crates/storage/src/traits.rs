use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{ChecklistItemRecord, StateRecord, TransitionEventRecord};

/// The storage trait for lifecycle state backends.
///
/// A `LifecycleStorage` implementation provides durable, transactional
/// storage for three logical tables: instance state, transition history,
/// and checklist items.
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing
/// an in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()` — start a transaction, returns a `Snapshot`
/// 2. Call mutating methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)` — commit and consume the transaction
///    OR `abort_snapshot(snapshot)` — roll back and consume the transaction
///
/// If a `Snapshot` is dropped without committing, the underlying
/// transaction MUST be rolled back (drop semantics on the underlying DB
/// transaction). Writes buffered in a snapshot must never be visible to
/// queries running outside it until the snapshot commits.
///
/// ## Stale-State Detection
///
/// `update_state` performs an optimistic compare-and-update:
/// `UPDATE WHERE current_state = expected_state`. If zero rows are
/// affected because the state moved, the method returns
/// `Err(StorageError::StaleState { ... })`. Backends must guarantee that
/// of two transactions racing on the same expected state, at most one
/// commits.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a single instance
/// can be shared across async task boundaries.
#[async_trait]
pub trait LifecycleStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    ///
    /// Must be `Send` to allow passing across async task boundaries.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations durable.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Mutations (within snapshot) ──────────────────────────────────────────

    /// Insert a new state record with `current_state = initial_state`.
    ///
    /// Creation and update metadata are both stamped with `user` and the
    /// store clock. Returns `Err(StorageError::AlreadyAssociated)` if a
    /// record with this `instance_id` already exists.
    async fn insert_state(
        &self,
        snapshot: &mut Self::Snapshot,
        instance_id: &str,
        lifecycle_name: &str,
        initial_state: &str,
        user: &str,
    ) -> Result<(), StorageError>;

    /// Read an instance's state record, locking the row for update.
    ///
    /// Uses `SELECT ... FOR UPDATE` semantics: the row cannot be modified
    /// by another transaction until this snapshot commits or aborts.
    ///
    /// Returns `Err(StorageError::InstanceNotFound)` if no record exists.
    async fn get_state_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        instance_id: &str,
    ) -> Result<StateRecord, StorageError>;

    /// Apply a state-conditioned UPDATE to an instance's current state.
    ///
    /// The UPDATE is conditional on `current_state = expected_state`.
    /// If zero rows are affected, returns `Err(StorageError::StaleState)`;
    /// if the instance does not exist at all, returns
    /// `Err(StorageError::InstanceNotFound)`. On success the update
    /// metadata is restamped with `user` and the store clock.
    async fn update_state(
        &self,
        snapshot: &mut Self::Snapshot,
        instance_id: &str,
        expected_state: &str,
        new_state: &str,
        user: &str,
    ) -> Result<(), StorageError>;

    /// Append a transition event to the instance's history.
    ///
    /// The store assigns `recorded_at` and a monotonic `seq`. Must be
    /// called in the SAME snapshot as the `update_state` it records, so a
    /// state change and its audit row commit or roll back together.
    async fn insert_transition_event(
        &self,
        snapshot: &mut Self::Snapshot,
        instance_id: &str,
        previous_state: &str,
        post_state: &str,
        user: &str,
    ) -> Result<(), StorageError>;

    /// Upsert the checklist row keyed `(instance_id, state, item_name)`.
    ///
    /// Rows are created lazily on first write; a second write to the same
    /// key overwrites value and update metadata.
    async fn upsert_checklist_item(
        &self,
        snapshot: &mut Self::Snapshot,
        instance_id: &str,
        state: &str,
        item_name: &str,
        checked: bool,
        user: &str,
    ) -> Result<(), StorageError>;

    /// Delete the state record for an instance.
    ///
    /// Returns `true` if a row was removed, `false` if none existed.
    /// A missing row is NOT an error.
    async fn delete_state(
        &self,
        snapshot: &mut Self::Snapshot,
        instance_id: &str,
    ) -> Result<bool, StorageError>;

    /// Delete all checklist rows for an instance, across every state
    /// scope. Returns the number of rows removed (possibly zero).
    async fn delete_checklist_items(
        &self,
        snapshot: &mut Self::Snapshot,
        instance_id: &str,
    ) -> Result<u64, StorageError>;

    // ── Queries (outside snapshot, against pool/connection) ──────────────────

    /// Read an instance's state record without locking.
    ///
    /// Returns `Err(StorageError::InstanceNotFound)` if no record exists.
    async fn get_state(&self, instance_id: &str) -> Result<StateRecord, StorageError>;

    /// List the checklist rows recorded for an instance under one state
    /// scope. Empty vec (not an error) when none exist.
    async fn list_checklist_items(
        &self,
        instance_id: &str,
        state: &str,
    ) -> Result<Vec<ChecklistItemRecord>, StorageError>;

    /// List an instance's transition events, oldest first.
    ///
    /// Ordered by `recorded_at` ascending with `seq` breaking ties.
    /// Empty vec (not an error) when the instance has no history.
    async fn list_transition_events(
        &self,
        instance_id: &str,
    ) -> Result<Vec<TransitionEventRecord>, StorageError>;

    /// List the ids of all instances currently in `state` for the given
    /// lifecycle name. No ordering guarantee; no duplicates.
    async fn list_instance_ids(
        &self,
        state: &str,
        lifecycle_name: &str,
    ) -> Result<Vec<String>, StorageError>;
}
