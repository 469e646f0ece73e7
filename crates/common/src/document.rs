//! Declarative scene documents.
//!
//! ```json
//! {
//!   "root": "R",
//!   "entities": {
//!     "R": { "name": "scene", "components": [] },
//!     "A": { "name": "A", "parent": "R", "components": [
//!       { "name": "transform", "props": { "position": { "x": 0, "y": 0, "z": 0 } } }
//!     ] }
//!   }
//! }
//! ```
//!
//! Entity order in the document is significant: it decides child order in the
//! entity tree, so [`EntityMap`] keeps entries in the order they were read.

use glam::{Quat, Vec3};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::EntityUuid;

/// Scene name of the transform component.
pub const SCENE_COMPONENT_TRANSFORM: &str = "transform";
/// Scene name of the dynamic-load marker component.
pub const SCENE_COMPONENT_DYNAMIC_LOAD: &str = "dynamic-load";

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A serialized world: a root UUID plus every entity keyed by UUID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub root: EntityUuid,
    pub entities: EntityMap,
}

impl SceneDocument {
    pub fn from_json_str(s: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, DocumentError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json_string_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Definition of the declared root entity, if the document carries one.
    pub fn root_definition(&self) -> Option<&EntityDefinition> {
        self.entities.get(&self.root)
    }

    /// Every entity except the declared root, in document order.
    pub fn non_root_entities(&self) -> impl Iterator<Item = (&EntityUuid, &EntityDefinition)> {
        self.entities.iter().filter(move |(uuid, _)| **uuid != self.root)
    }
}

/// Declared state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<EntityUuid>,
    #[serde(default)]
    pub components: Vec<ComponentDefinition>,
}

impl EntityDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            components: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<EntityUuid>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_component(mut self, component: ComponentDefinition) -> Self {
        self.components.push(component);
        self
    }

    /// First component with the given scene name.
    pub fn component(&self, name: &str) -> Option<&ComponentDefinition> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.component(name).is_some()
    }
}

/// One component entry: a scene type name plus a JSON property bag.
///
/// The props are only interpreted by whatever deserializer the registry
/// resolves for `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub name: String,
    #[serde(default = "empty_props")]
    pub props: serde_json::Value,
}

impl ComponentDefinition {
    pub fn new(name: impl Into<String>, props: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            props,
        }
    }

    /// A component with an empty property bag.
    pub fn tag(name: impl Into<String>) -> Self {
        Self::new(name, empty_props())
    }

    /// Decode the props into a typed schema.
    pub fn props_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.props)
    }
}

fn empty_props() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Entities keyed by UUID, in document order.
///
/// A key repeated in the source replaces the earlier definition but keeps the
/// earlier position.
pub type EntityMap = IndexMap<EntityUuid, EntityDefinition>;

/// `{ "x": .., "y": .., "z": .. }` as written in scene props.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Vec3Props {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3Props> for Vec3 {
    fn from(v: Vec3Props) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuatProps {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for QuatProps {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl From<QuatProps> for Quat {
    fn from(q: QuatProps) -> Self {
        Quat::from_xyzw(q.x, q.y, q.z, q.w).normalize()
    }
}

/// Props schema of the `transform` component.
///
/// `position` is required; a deferred entity without it can never be placed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformProps {
    pub position: Vec3Props,
    #[serde(default)]
    pub rotation: QuatProps,
    #[serde(default = "unit_scale")]
    pub scale: Vec3Props,
}

fn unit_scale() -> Vec3Props {
    Vec3Props {
        x: 1.0,
        y: 1.0,
        z: 1.0,
    }
}

impl From<TransformProps> for crate::types::Transform {
    fn from(p: TransformProps) -> Self {
        Self {
            position: p.position.into(),
            rotation: p.rotation.into(),
            scale: p.scale.into(),
        }
    }
}

/// Props schema of the `dynamic-load` marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicLoadProps {
    pub distance: f32,
}
