//! lcm-engine: lifecycle state engine.
//!
//! Manages the lifecycle state of arbitrary external resources by
//! associating each with a named lifecycle instance, applying
//! optimistically validated state transitions, tracking per-state
//! checklist completion, and keeping an immutable transition history —
//! all through a pluggable [`lcm_storage::LifecycleStorage`] backend that
//! supplies the transactional guarantees.
//!
//! # Public API
//!
//! - [`LifecycleEngine`] — the eight caller-facing operations
//! - [`LifecycleError`] — not-found / duplicate / stale / persistence taxonomy
//! - [`LifecycleHandle`] + [`ManagedLifecycle`] — the association
//!   capability resource types implement to integrate
//! - [`ChecklistState`] — a state record merged with one state scope's
//!   checklist rows

mod capability;
mod engine;
mod error;

pub use capability::{LifecycleHandle, ManagedLifecycle};
pub use engine::{ChecklistState, LifecycleEngine};
pub use error::LifecycleError;
