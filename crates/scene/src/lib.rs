//! Scene loading for metaspace.
//!
//! A [`SceneWorld`] owns one entity tree and turns declarative
//! [`SceneDocument`](metaspace_common::SceneDocument)s into live entities:
//! full loads replace the scene, incremental loads merge into it, and
//! dynamically loaded entities wait in a deferred set until an observer
//! comes close.
//!
//! # Invariants
//! - One tree root per scene, fixed until the next full load or unload.
//! - UUIDs are unique in the tree; incoming collisions are remapped.
//! - Per-component and per-entity failures are logged, never fatal.

pub mod config;
pub mod error;
pub mod loader;
pub mod registry;
pub mod remap;
pub mod tree;
pub mod world;

pub use config::SceneConfig;
pub use error::{ComponentError, SceneError, TreeError};
pub use loader::{ComponentLoad, load_component, load_scene_entity};
pub use registry::{
    ComponentDeserializer, ComponentRegistry, RegisteredComponent, SCENE_COMPONENT_MODEL,
    SCENE_COMPONENT_SCENE, SCENE_COMPONENT_VISIBLE,
};
pub use remap::{ReferencePolicy, UuidRemap, remap_definition, scan_references};
pub use tree::{EntityTree, TreeNode};
pub use world::{LoadStatus, SceneEvent, SceneWorld};

pub fn crate_info() -> &'static str {
    "metaspace-scene v0.1.0"
}
