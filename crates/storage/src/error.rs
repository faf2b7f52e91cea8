/// All errors that can be returned by a LifecycleStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic precondition failed — the instance's current state no
    /// longer matches the state the caller conditioned its update on.
    #[error("stale state for lifecycle instance {instance_id}: expected current state '{expected_state}'")]
    StaleState {
        instance_id: String,
        expected_state: String,
    },

    /// No state record exists for the given instance id.
    #[error("lifecycle instance not found: {instance_id}")]
    InstanceNotFound { instance_id: String },

    /// A state record with this instance id already exists.
    #[error("lifecycle instance already associated: {instance_id}")]
    AlreadyAssociated { instance_id: String },

    /// A backend-specific storage error (connectivity, constraint
    /// violation, timeout, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),
}
