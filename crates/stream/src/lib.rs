//! Dynamic loading: entities marked `dynamic-load` are kept out of the initial
//! scene and materialized when an observer comes within their trigger
//! distance.
//!
//! # Invariants
//! - Deferring never touches the entity tree; materialization is the caller's.
//! - An entry leaves the deferred set exactly once.
//! - A marked entity without a usable position is never loaded.

mod budget;
mod deferred;
mod grid;

pub use budget::{ProximityStreamer, StreamConfig, StreamStats};
pub use deferred::{
    DeferredEntry, DeferredSet, LoadMode, Partition, StreamError, split_lazy_loaded,
};
pub use grid::{CellCoord, GridPartition};

pub fn crate_info() -> &'static str {
    "metaspace-stream v0.1.0"
}
