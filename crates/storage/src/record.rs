use serde::{Deserialize, Serialize};

/// The current state of one lifecycle instance as stored in the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRecord {
    pub instance_id: String,
    /// Name of the lifecycle definition governing this instance.
    /// Immutable after association.
    pub lifecycle_name: String,
    pub current_state: String,
    pub created_by: String,
    /// ISO 8601 / RFC 3339 timestamp string, assigned by the store.
    pub created_at: String,
    pub updated_by: String,
    /// ISO 8601 / RFC 3339 timestamp string, assigned by the store.
    pub updated_at: String,
}

/// An immutable audit record of a single state transition.
///
/// Events are ordered per instance by `recorded_at` ascending, with the
/// store-assigned `seq` breaking ties in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEventRecord {
    pub instance_id: String,
    pub previous_state: String,
    pub post_state: String,
    /// Opaque auditing attribute attached verbatim from the caller.
    pub user: String,
    /// ISO 8601 / RFC 3339 timestamp string, assigned by the store.
    pub recorded_at: String,
    /// Monotonic insertion sequence number, assigned by the store.
    pub seq: i64,
}

/// One checklist item flag, keyed `(instance_id, state, item_name)`.
///
/// Rows are scoped per `(instance, state)`: revisiting a state and setting
/// the same item overwrites the existing row rather than accumulating a
/// per-visit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItemRecord {
    pub instance_id: String,
    /// The state scope the item was recorded under, which is not
    /// necessarily the instance's current state.
    pub state: String,
    pub item_name: String,
    pub checked: bool,
    pub updated_by: String,
    /// ISO 8601 / RFC 3339 timestamp string, assigned by the store.
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_event_serializes_with_all_fields() {
        let event = TransitionEventRecord {
            instance_id: "inst-1".to_string(),
            previous_state: "Created".to_string(),
            post_state: "Testing".to_string(),
            user: "alice".to_string(),
            recorded_at: "2026-01-01T00:00:00Z".to_string(),
            seq: 7,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["previous_state"], "Created");
        assert_eq!(json["post_state"], "Testing");
        assert_eq!(json["seq"], 7);
    }
}
