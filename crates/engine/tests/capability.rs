//! Exercises the `ManagedLifecycle` association capability the way an
//! external resource type would implement it: the resource stores the
//! engine-issued handle locally and keeps its cached view in sync, while
//! all store orchestration goes through the engine.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lcm_engine::{LifecycleEngine, LifecycleError, LifecycleHandle, ManagedLifecycle};
use lcm_storage::memory::MemoryStorage;

/// A stand-in for an API resource that tracks lifecycles by name.
#[derive(Default)]
struct ApiResource {
    handles: HashMap<String, LifecycleHandle>,
}

#[async_trait]
impl ManagedLifecycle for ApiResource {
    async fn associate_lifecycle(&mut self, handle: LifecycleHandle) -> Result<(), LifecycleError> {
        self.handles.insert(handle.lifecycle_name.clone(), handle);
        Ok(())
    }

    async fn dissociate_lifecycle(&mut self, lifecycle_name: &str) -> Result<(), LifecycleError> {
        self.handles.remove(lifecycle_name);
        Ok(())
    }

    async fn set_lifecycle_state_info(
        &mut self,
        handle: LifecycleHandle,
    ) -> Result<(), LifecycleError> {
        self.handles.insert(handle.lifecycle_name.clone(), handle);
        Ok(())
    }
}

#[tokio::test]
async fn resource_tracks_handle_through_full_lifecycle() {
    let engine = LifecycleEngine::new(Arc::new(MemoryStorage::new()));
    let mut api = ApiResource::default();

    // Associate and hand the resource its handle.
    let id = engine
        .associate("apiLifecycle", "Created", "alice")
        .await
        .unwrap();
    let record = engine.get_state(&id).await.unwrap();
    api.associate_lifecycle(LifecycleHandle::from(&record))
        .await
        .unwrap();
    assert_eq!(
        api.handles["apiLifecycle"].current_state,
        "Created".to_string()
    );

    // Transition through the engine, then refresh the cached view.
    engine
        .transition("Created", "Testing", &id, "bob")
        .await
        .unwrap();
    let record = engine.get_state(&id).await.unwrap();
    api.set_lifecycle_state_info(LifecycleHandle::from(&record))
        .await
        .unwrap();
    assert_eq!(
        api.handles["apiLifecycle"].current_state,
        "Testing".to_string()
    );

    // Dissociate: the resource drops its handle and the engine removes
    // the instance.
    let handle = api.handles["apiLifecycle"].clone();
    api.dissociate_lifecycle("apiLifecycle").await.unwrap();
    engine.dissociate(&handle.instance_id).await.unwrap();

    assert!(api.handles.is_empty());
    assert!(matches!(
        engine.get_state(&id).await.unwrap_err(),
        LifecycleError::NotFound { .. }
    ));
}

#[tokio::test]
async fn handle_round_trips_through_serde() {
    let handle = LifecycleHandle {
        instance_id: "inst-1".to_string(),
        lifecycle_name: "apiLifecycle".to_string(),
        current_state: "Created".to_string(),
    };
    let json = serde_json::to_string(&handle).unwrap();
    let back: LifecycleHandle = serde_json::from_str(&json).unwrap();
    assert_eq!(back, handle);
}
