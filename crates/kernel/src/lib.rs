//! Kernel: the entity store and the engine tick counter.
//!
//! # Invariants
//! - Entity handles are never reused within one store.
//! - Every allocation and release produces an event.

pub mod store;

pub use store::{EntityEvent, EntityStore};
