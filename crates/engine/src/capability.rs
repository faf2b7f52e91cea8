//! Association capability: the shape a resource type presents to take
//! part in lifecycle tracking.
//!
//! The engine never calls these methods. Resource types (APIs, apps,
//! artifacts) implement [`ManagedLifecycle`] to persist the engine-issued
//! handle on themselves and keep their cached view current; all
//! orchestration — transitions, checklist updates, dissociation against
//! the store — stays in [`LifecycleEngine`](crate::LifecycleEngine).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lcm_storage::StateRecord;

use crate::error::LifecycleError;

/// The opaque handle the engine issues for one lifecycle instance.
///
/// Holds the correlation key (`instance_id`) plus a cached view of the
/// governing lifecycle and current state. The cache goes stale the moment
/// anyone else transitions the instance; re-read via
/// [`LifecycleEngine::get_state`](crate::LifecycleEngine::get_state)
/// before acting on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleHandle {
    pub instance_id: String,
    pub lifecycle_name: String,
    pub current_state: String,
}

impl From<&StateRecord> for LifecycleHandle {
    fn from(record: &StateRecord) -> Self {
        Self {
            instance_id: record.instance_id.clone(),
            lifecycle_name: record.lifecycle_name.clone(),
            current_state: record.current_state.clone(),
        }
    }
}

/// Implemented by any resource type that binds itself to a lifecycle
/// instance.
#[async_trait]
pub trait ManagedLifecycle {
    /// Persist the engine-issued handle on the resource after
    /// association.
    async fn associate_lifecycle(&mut self, handle: LifecycleHandle) -> Result<(), LifecycleError>;

    /// Remove the locally stored handle for `lifecycle_name`. The
    /// resource is expected to also call
    /// [`LifecycleEngine::dissociate`](crate::LifecycleEngine::dissociate)
    /// with the handle's instance id.
    async fn dissociate_lifecycle(&mut self, lifecycle_name: &str) -> Result<(), LifecycleError>;

    /// Refresh the resource's cached view after a transition.
    async fn set_lifecycle_state_info(
        &mut self,
        handle: LifecycleHandle,
    ) -> Result<(), LifecycleError>;
}
