use lcm_storage::StorageError;

/// All errors surfaced by the lifecycle engine.
///
/// Every variant names the instance it concerns; persistence failures also
/// carry the engine operation and chain the backend cause, so a single
/// error message is enough to diagnose a failure without correlating logs.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The referenced instance does not exist.
    #[error("lifecycle instance not found: {instance_id} (while {operation})")]
    NotFound {
        operation: &'static str,
        instance_id: String,
    },

    /// A caller-supplied instance id collides with an existing instance.
    #[error("lifecycle instance already associated: {instance_id}")]
    DuplicateInstance { instance_id: String },

    /// Optimistic-concurrency precondition failed on a transition: the
    /// stored current state no longer matches the state the caller read.
    /// The engine never retries; the caller must re-fetch and decide.
    #[error("stale state on transition for instance {instance_id}: expected current state '{expected_state}'")]
    StaleState {
        instance_id: String,
        expected_state: String,
    },

    /// The underlying store failed. Wraps the backend's native error.
    #[error("storage failure while {operation} (instance {instance_id})")]
    Persistence {
        operation: &'static str,
        instance_id: String,
        #[source]
        source: StorageError,
    },
}

impl LifecycleError {
    /// Translate a storage error into the engine taxonomy, attaching the
    /// operation name and the instance the operation was addressing.
    pub(crate) fn from_storage(
        operation: &'static str,
        instance_id: &str,
        err: StorageError,
    ) -> Self {
        match err {
            StorageError::InstanceNotFound { instance_id } => LifecycleError::NotFound {
                operation,
                instance_id,
            },
            StorageError::AlreadyAssociated { instance_id } => {
                LifecycleError::DuplicateInstance { instance_id }
            }
            StorageError::StaleState {
                instance_id,
                expected_state,
            } => LifecycleError::StaleState {
                instance_id,
                expected_state,
            },
            err @ StorageError::Backend(_) => LifecycleError::Persistence {
                operation,
                instance_id: instance_id.to_string(),
                source: err,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn persistence_error_chains_backend_cause() {
        let err = LifecycleError::from_storage(
            "transition",
            "inst-1",
            StorageError::Backend("connection reset".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "storage failure while transition (instance inst-1)"
        );
        let cause = err.source().expect("backend cause must be chained");
        assert_eq!(cause.to_string(), "storage backend error: connection reset");
    }

    #[test]
    fn not_found_keeps_operation_context() {
        let err = LifecycleError::from_storage(
            "get_state",
            "inst-1",
            StorageError::InstanceNotFound {
                instance_id: "inst-1".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "lifecycle instance not found: inst-1 (while get_state)"
        );
    }
}
