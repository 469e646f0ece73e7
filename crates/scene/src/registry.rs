//! Component registry: scene type name → how to attach that component.
//!
//! Three tables, looked up in order by the loader:
//! - scene loaders: scene name → optional deserializer, optional default
//!   props, and the prop paths that hold entity references;
//! - scene component names: storage tag → scene name;
//! - prefabs: named component lists used to create editor nodes.

use metaspace_common::{
    ComponentDefinition, DynamicLoadProps, Entity, SCENE_COMPONENT_DYNAMIC_LOAD,
    SCENE_COMPONENT_TRANSFORM, Transform, TransformProps,
};
use metaspace_ecs::{ComponentStore, ComponentTag, ComponentValue, Object3d, tags};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ComponentError;

pub const SCENE_COMPONENT_VISIBLE: &str = "visible";
pub const SCENE_COMPONENT_MODEL: &str = "model";
pub const SCENE_COMPONENT_SCENE: &str = "scene";

/// Interprets one component's props and attaches whatever state it needs.
pub trait ComponentDeserializer: Send + Sync {
    fn deserialize(
        &self,
        components: &mut ComponentStore,
        entity: Entity,
        props: &serde_json::Value,
    ) -> Result<(), ComponentError>;
}

impl<F> ComponentDeserializer for F
where
    F: Fn(&mut ComponentStore, Entity, &serde_json::Value) -> Result<(), ComponentError>
        + Send
        + Sync,
{
    fn deserialize(
        &self,
        components: &mut ComponentStore,
        entity: Entity,
        props: &serde_json::Value,
    ) -> Result<(), ComponentError> {
        self(components, entity, props)
    }
}

#[derive(Clone)]
pub struct RegisteredComponent {
    pub type_name: String,
    pub deserializer: Option<Arc<dyn ComponentDeserializer>>,
    /// `None` makes the component a presence-only tag.
    pub default_props: Option<serde_json::Map<String, serde_json::Value>>,
    /// JSON pointers into props whose string values (or arrays of strings)
    /// are entity UUIDs.
    pub entity_references: Vec<String>,
}

impl RegisteredComponent {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            deserializer: None,
            default_props: None,
            entity_references: Vec::new(),
        }
    }

    pub fn with_deserializer(mut self, deserializer: impl ComponentDeserializer + 'static) -> Self {
        self.deserializer = Some(Arc::new(deserializer));
        self
    }

    pub fn with_defaults(mut self, defaults: serde_json::Map<String, serde_json::Value>) -> Self {
        self.default_props = Some(defaults);
        self
    }

    pub fn with_reference(mut self, pointer: impl Into<String>) -> Self {
        self.entity_references.push(pointer.into());
        self
    }
}

impl fmt::Debug for RegisteredComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredComponent")
            .field("type_name", &self.type_name)
            .field("deserializer", &self.deserializer.is_some())
            .field("default_props", &self.default_props)
            .field("entity_references", &self.entity_references)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    scene_loading: BTreeMap<String, RegisteredComponent>,
    scene_components: BTreeMap<ComponentTag, String>,
    prefabs: BTreeMap<String, Vec<ComponentDefinition>>,
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the engine's own components.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            RegisteredComponent::new(SCENE_COMPONENT_TRANSFORM)
                .with_deserializer(deserialize_transform),
        );
        registry.register_name(tags::TRANSFORM, SCENE_COMPONENT_TRANSFORM);

        registry.register(
            RegisteredComponent::new(SCENE_COMPONENT_DYNAMIC_LOAD)
                .with_deserializer(deserialize_dynamic_load),
        );
        registry.register_name(tags::DYNAMIC_LOAD, SCENE_COMPONENT_DYNAMIC_LOAD);

        registry.register(
            RegisteredComponent::new(SCENE_COMPONENT_MODEL).with_deserializer(deserialize_model),
        );
        registry.register_name(tags::OBJECT3D, SCENE_COMPONENT_MODEL);

        registry.register_tag(tags::VISIBLE, SCENE_COMPONENT_VISIBLE);
        registry.register_tag(tags::SCENE, SCENE_COMPONENT_SCENE);
        registry
    }

    /// Add or replace a scene loader.
    pub fn register(&mut self, component: RegisteredComponent) {
        tracing::trace!(component = %component.type_name, "registering scene component");
        self.scene_loading
            .insert(component.type_name.clone(), component);
    }

    /// Map a storage tag to the scene name it is written as.
    pub fn register_name(&mut self, tag: ComponentTag, scene_name: impl Into<String>) {
        self.scene_components.insert(tag, scene_name.into());
    }

    /// A presence-only component: no deserializer, no defaults.
    pub fn register_tag(&mut self, tag: ComponentTag, scene_name: &str) {
        self.register(RegisteredComponent::new(scene_name));
        self.register_name(tag, scene_name);
    }

    /// A data component attached as defaults merged with document props.
    pub fn register_data(
        &mut self,
        tag: ComponentTag,
        scene_name: &str,
        defaults: serde_json::Map<String, serde_json::Value>,
    ) {
        self.register(RegisteredComponent::new(scene_name).with_defaults(defaults));
        self.register_name(tag, scene_name);
    }

    pub fn register_prefab(&mut self, name: impl Into<String>, components: Vec<ComponentDefinition>) {
        self.prefabs.insert(name.into(), components);
    }

    pub fn resolve(&self, type_name: &str) -> Option<&RegisteredComponent> {
        self.scene_loading.get(type_name)
    }

    /// Storage tag written as `scene_name`.
    pub fn tag_for(&self, scene_name: &str) -> Option<&ComponentTag> {
        self.scene_components
            .iter()
            .find(|(_, name)| name.as_str() == scene_name)
            .map(|(tag, _)| tag)
    }

    /// Every storage tag the registry maps to a scene name.
    pub fn tags(&self) -> impl Iterator<Item = &ComponentTag> {
        self.scene_components.keys()
    }

    pub fn entity_references(&self, type_name: &str) -> &[String] {
        self.resolve(type_name)
            .map(|c| c.entity_references.as_slice())
            .unwrap_or(&[])
    }

    pub fn prefab(&self, name: &str) -> Option<&[ComponentDefinition]> {
        self.prefabs.get(name).map(Vec::as_slice)
    }

    pub fn prefab_names(&self) -> impl Iterator<Item = &str> {
        self.prefabs.keys().map(String::as_str)
    }
}

fn typed_props<T: serde::de::DeserializeOwned>(
    component: &str,
    props: &serde_json::Value,
) -> Result<T, ComponentError> {
    T::deserialize(props).map_err(|source| ComponentError::InvalidProps {
        component: component.to_string(),
        source,
    })
}

fn deserialize_transform(
    components: &mut ComponentStore,
    entity: Entity,
    props: &serde_json::Value,
) -> Result<(), ComponentError> {
    let props: TransformProps = typed_props(SCENE_COMPONENT_TRANSFORM, props)?;
    components.insert(
        entity,
        &tags::TRANSFORM,
        ComponentValue::Transform(Transform::from(props)),
    )?;
    Ok(())
}

fn deserialize_dynamic_load(
    components: &mut ComponentStore,
    entity: Entity,
    props: &serde_json::Value,
) -> Result<(), ComponentError> {
    let props: DynamicLoadProps = typed_props(SCENE_COMPONENT_DYNAMIC_LOAD, props)?;
    components.insert(
        entity,
        &tags::DYNAMIC_LOAD,
        ComponentValue::DynamicLoad {
            distance: props.distance,
        },
    )?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ModelProps {
    src: String,
}

/// Attaches the renderable and marks the entity as waiting on its asset.
fn deserialize_model(
    components: &mut ComponentStore,
    entity: Entity,
    props: &serde_json::Value,
) -> Result<(), ComponentError> {
    let props: ModelProps = typed_props(SCENE_COMPONENT_MODEL, props)?;
    if props.src.is_empty() {
        return Err(ComponentError::Rejected {
            component: SCENE_COMPONENT_MODEL.to_string(),
            reason: "empty src".into(),
        });
    }
    components.insert(
        entity,
        &tags::OBJECT3D,
        ComponentValue::Object3d(Object3d {
            src: Some(props.src),
            visible: true,
        }),
    )?;
    components.insert(entity, &tags::ASSET_PENDING, ComponentValue::Tag)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtins_resolve() {
        let registry = ComponentRegistry::with_builtins();
        for name in ["transform", "dynamic-load", "model", "visible", "scene"] {
            assert!(registry.resolve(name).is_some(), "{name}");
        }
        assert!(registry.resolve("Unknown").is_none());
        assert_eq!(registry.tag_for("visible"), Some(&tags::VISIBLE));
        assert!(registry.resolve("visible").unwrap().deserializer.is_none());
        assert!(registry.resolve("visible").unwrap().default_props.is_none());
    }

    #[test]
    fn transform_deserializer_attaches_typed_value() {
        let registry = ComponentRegistry::with_builtins();
        let mut store = ComponentStore::new();
        let deser = registry.resolve("transform").unwrap().deserializer.clone().unwrap();
        deser
            .deserialize(
                &mut store,
                Entity(1),
                &json!({ "position": { "x": 1, "y": 2, "z": 3 } }),
            )
            .unwrap();
        assert_eq!(
            store.transform(Entity(1)).unwrap().position,
            glam::Vec3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn model_marks_asset_pending() {
        let registry = ComponentRegistry::with_builtins();
        let mut store = ComponentStore::new();
        let deser = registry.resolve("model").unwrap().deserializer.clone().unwrap();
        deser
            .deserialize(&mut store, Entity(2), &json!({ "src": "chair.glb" }))
            .unwrap();
        assert!(store.has(Entity(2), &tags::ASSET_PENDING));
        assert_eq!(
            store.object3d(Entity(2)).unwrap().src.as_deref(),
            Some("chair.glb")
        );

        let err = deser
            .deserialize(&mut store, Entity(3), &json!({ "src": 5 }))
            .unwrap_err();
        assert!(matches!(err, ComponentError::InvalidProps { .. }));
    }

    #[test]
    fn closures_are_deserializers() {
        let mut registry = ComponentRegistry::new();
        registry.register(RegisteredComponent::new("noop").with_deserializer(
            |_: &mut ComponentStore, _: Entity, _: &serde_json::Value| Ok::<(), ComponentError>(()),
        ));
        assert!(registry.resolve("noop").unwrap().deserializer.is_some());
    }

    #[test]
    fn references_and_prefabs() {
        let mut registry = ComponentRegistry::new();
        registry.register(RegisteredComponent::new("follow").with_reference("/target"));
        registry.register_prefab("cube", vec![ComponentDefinition::tag("visible")]);
        assert_eq!(registry.entity_references("follow"), &["/target".to_string()]);
        assert!(registry.entity_references("nothing").is_empty());
        assert_eq!(registry.prefab("cube").unwrap().len(), 1);
        assert_eq!(registry.prefab_names().collect::<Vec<_>>(), vec!["cube"]);
    }
}
