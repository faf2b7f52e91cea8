//! lcm-storage: storage contract for the lifecycle state engine.
//!
//! Defines the [`LifecycleStorage`] trait (a transactional CRUD interface
//! over the state, history, and checklist tables), the record types those
//! tables hold, the [`StorageError`] type, a backend-agnostic
//! [`conformance`] suite, and the reference in-memory backend
//! [`memory::MemoryStorage`].

mod error;
mod record;
mod traits;

pub mod conformance;
pub mod memory;

pub use error::StorageError;
pub use record::{ChecklistItemRecord, StateRecord, TransitionEventRecord};
pub use traits::LifecycleStorage;
