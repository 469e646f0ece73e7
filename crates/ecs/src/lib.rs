//! Deterministic ECS-style component storage.
//!
//! Components are keyed by a [`ComponentTag`] and stored in BTreeMaps so
//! iteration order never depends on insertion order or hashing.
//!
//! # Invariants
//! - Only registered tags can be attached.
//! - Every mutation produces a [`ComponentEvent`]; observers (the asset
//!   settlement tracker, mostly) see enter/exit by draining them.

use metaspace_common::{Entity, Transform};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Storage key of a component type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentTag(Cow<'static, str>);

impl ComponentTag {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tags of the components the engine itself knows about.
pub mod tags {
    use super::ComponentTag;

    pub const NAME: ComponentTag = ComponentTag::from_static("Name");
    pub const TRANSFORM: ComponentTag = ComponentTag::from_static("Transform");
    pub const VISIBLE: ComponentTag = ComponentTag::from_static("Visible");
    pub const OBJECT3D: ComponentTag = ComponentTag::from_static("Object3D");
    pub const DYNAMIC_LOAD: ComponentTag = ComponentTag::from_static("DynamicLoad");
    /// Present while an entity is waiting on an external asset.
    pub const ASSET_PENDING: ComponentTag = ComponentTag::from_static("SceneAssetPending");
    /// Marks the root of a loaded scene.
    pub const SCENE: ComponentTag = ComponentTag::from_static("Scene");

    pub const BUILTIN: [ComponentTag; 7] = [
        NAME,
        TRANSFORM,
        VISIBLE,
        OBJECT3D,
        DYNAMIC_LOAD,
        ASSET_PENDING,
        SCENE,
    ];
}

/// Renderable representation owned by an entity.
///
/// The renderer builds the real object from `src`; the scene only decides
/// whether it is shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object3d {
    pub src: Option<String>,
    pub visible: bool,
}

/// Attached component data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComponentValue {
    /// Presence-only marker with no payload.
    Tag,
    Name(String),
    Transform(Transform),
    Object3d(Object3d),
    DynamicLoad { distance: f32 },
    /// Default props merged with document props, for components that have
    /// no dedicated deserializer.
    Props(serde_json::Map<String, serde_json::Value>),
}

impl ComponentValue {
    pub fn is_tag(&self) -> bool {
        matches!(self, Self::Tag)
    }
}

/// Events produced by component mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentEvent {
    Added { entity: Entity, tag: ComponentTag },
    Updated { entity: Entity, tag: ComponentTag },
    Removed { entity: Entity, tag: ComponentTag },
}

#[derive(Debug, thiserror::Error)]
pub enum ComponentStoreError {
    #[error("component `{0}` is not registered")]
    Unregistered(ComponentTag),
}

/// Component storage for all tags.
#[derive(Debug, Clone)]
pub struct ComponentStore {
    registered: BTreeSet<ComponentTag>,
    storages: BTreeMap<ComponentTag, BTreeMap<Entity, ComponentValue>>,
    events: Vec<ComponentEvent>,
}

impl Default for ComponentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentStore {
    /// A store with the builtin tags registered.
    pub fn new() -> Self {
        let mut store = Self {
            registered: BTreeSet::new(),
            storages: BTreeMap::new(),
            events: Vec::new(),
        };
        for tag in tags::BUILTIN {
            store.register(tag);
        }
        store
    }

    /// Register a component tag. Returns false if it already was.
    pub fn register(&mut self, tag: ComponentTag) -> bool {
        self.registered.insert(tag)
    }

    pub fn is_registered(&self, tag: &ComponentTag) -> bool {
        self.registered.contains(tag)
    }

    /// Drain and return all pending component events.
    pub fn drain_events(&mut self) -> Vec<ComponentEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read-only access to pending events.
    pub fn events(&self) -> &[ComponentEvent] {
        &self.events
    }

    /// Attach (or replace) a component.
    pub fn insert(
        &mut self,
        entity: Entity,
        tag: &ComponentTag,
        value: ComponentValue,
    ) -> Result<(), ComponentStoreError> {
        if !self.registered.contains(tag) {
            return Err(ComponentStoreError::Unregistered(tag.clone()));
        }
        let storage = self.storages.entry(tag.clone()).or_default();
        let event = if storage.insert(entity, value).is_some() {
            ComponentEvent::Updated {
                entity,
                tag: tag.clone(),
            }
        } else {
            ComponentEvent::Added {
                entity,
                tag: tag.clone(),
            }
        };
        self.events.push(event);
        Ok(())
    }

    pub fn remove(&mut self, entity: Entity, tag: &ComponentTag) -> Option<ComponentValue> {
        let removed = self.storages.get_mut(tag)?.remove(&entity);
        if removed.is_some() {
            self.events.push(ComponentEvent::Removed {
                entity,
                tag: tag.clone(),
            });
        }
        removed
    }

    pub fn get(&self, entity: Entity, tag: &ComponentTag) -> Option<&ComponentValue> {
        self.storages.get(tag)?.get(&entity)
    }

    /// Mutable access. Does not produce an event.
    pub fn get_mut(&mut self, entity: Entity, tag: &ComponentTag) -> Option<&mut ComponentValue> {
        self.storages.get_mut(tag)?.get_mut(&entity)
    }

    pub fn has(&self, entity: Entity, tag: &ComponentTag) -> bool {
        self.get(entity, tag).is_some()
    }

    /// Entities carrying `tag`, in entity order.
    pub fn entities_with<'a>(
        &'a self,
        tag: &ComponentTag,
    ) -> impl Iterator<Item = Entity> + use<'a> {
        self.storages
            .get(tag)
            .into_iter()
            .flat_map(|storage| storage.keys().copied())
    }

    pub fn count(&self, tag: &ComponentTag) -> usize {
        self.storages.get(tag).map_or(0, BTreeMap::len)
    }

    /// Tags attached to an entity, in tag order.
    pub fn tags_of(&self, entity: Entity) -> Vec<&ComponentTag> {
        self.storages
            .iter()
            .filter(|(_, storage)| storage.contains_key(&entity))
            .map(|(tag, _)| tag)
            .collect()
    }

    /// Remove all components for an entity.
    pub fn remove_entity(&mut self, entity: Entity) {
        let attached: Vec<ComponentTag> = self.tags_of(entity).into_iter().cloned().collect();
        tracing::trace!(%entity, components = attached.len(), "removing entity components");
        for tag in attached {
            self.remove(entity, &tag);
        }
    }

    // --- typed accessors for builtin components ---

    pub fn name(&self, entity: Entity) -> Option<&str> {
        match self.get(entity, &tags::NAME) {
            Some(ComponentValue::Name(name)) => Some(name),
            _ => None,
        }
    }

    pub fn transform(&self, entity: Entity) -> Option<&Transform> {
        match self.get(entity, &tags::TRANSFORM) {
            Some(ComponentValue::Transform(t)) => Some(t),
            _ => None,
        }
    }

    pub fn object3d(&self, entity: Entity) -> Option<&Object3d> {
        match self.get(entity, &tags::OBJECT3D) {
            Some(ComponentValue::Object3d(obj)) => Some(obj),
            _ => None,
        }
    }

    pub fn object3d_mut(&mut self, entity: Entity) -> Option<&mut Object3d> {
        match self.get_mut(entity, &tags::OBJECT3D) {
            Some(ComponentValue::Object3d(obj)) => Some(obj),
            _ => None,
        }
    }
}
