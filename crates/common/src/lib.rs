//! Shared types for the metaspace engine.
//!
//! Everything here is plain data: opaque entity handles, scene-level UUIDs,
//! transforms, and the declarative scene document that loaders consume.

pub mod document;
pub mod types;

pub use document::{
    ComponentDefinition, DocumentError, DynamicLoadProps, EntityDefinition, EntityMap,
    QuatProps, SCENE_COMPONENT_DYNAMIC_LOAD, SCENE_COMPONENT_TRANSFORM, SceneDocument,
    TransformProps, Vec3Props,
};
pub use types::{Entity, EntityUuid, Transform};
