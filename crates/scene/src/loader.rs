//! Materializing declared entities: name, components, default visibility.
//!
//! Nothing here is fatal. A component that fails is logged and skipped;
//! the rest of the entity, and every other entity, still loads.

use metaspace_common::{ComponentDefinition, Entity, EntityDefinition, EntityUuid};
use metaspace_ecs::{ComponentStore, ComponentValue, tags};

use crate::error::ComponentError;
use crate::registry::ComponentRegistry;

/// How a single component entry was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentLoad {
    /// A registered deserializer took the props.
    Deserialized,
    /// Attached directly, as a tag or as defaults merged with props.
    Attached,
    /// Not loaded; the reason was logged.
    Skipped,
}

/// Resolve one component entry through the registry and attach it.
pub fn load_component(
    registry: &ComponentRegistry,
    components: &mut ComponentStore,
    entity: Entity,
    component: &ComponentDefinition,
) -> Result<ComponentLoad, ComponentError> {
    let Some(scene_component) = registry.resolve(&component.name) else {
        tracing::warn!(component = %component.name, %entity, "unknown scene component");
        return Ok(ComponentLoad::Skipped);
    };

    if let Some(deserializer) = &scene_component.deserializer {
        deserializer.deserialize(components, entity, &component.props)?;
        return Ok(ComponentLoad::Deserialized);
    }

    let Some(tag) = registry.tag_for(&component.name) else {
        tracing::warn!(component = %component.name, "could not find component name");
        return Ok(ComponentLoad::Skipped);
    };
    if !components.is_registered(tag) {
        tracing::warn!(component = %component.name, %tag, "could not find component");
        return Ok(ComponentLoad::Skipped);
    }

    let value = match &scene_component.default_props {
        None => ComponentValue::Tag,
        Some(defaults) => {
            let mut merged = defaults.clone();
            match &component.props {
                serde_json::Value::Object(props) => {
                    for (key, value) in props {
                        merged.insert(key.clone(), value.clone());
                    }
                }
                serde_json::Value::Null => {}
                _ => {
                    return Err(ComponentError::Rejected {
                        component: component.name.clone(),
                        reason: "props must be an object".into(),
                    });
                }
            }
            ComponentValue::Props(merged)
        }
    };
    components.insert(entity, tag, value)?;
    Ok(ComponentLoad::Attached)
}

/// Attach the name and every listed component of `definition` to `entity`.
///
/// Entities without a `Visible` marker have their renderable hidden.
/// Returns the number of components that failed.
pub fn load_scene_entity(
    registry: &ComponentRegistry,
    components: &mut ComponentStore,
    entity: Entity,
    uuid: &EntityUuid,
    definition: &EntityDefinition,
) -> usize {
    if let Err(e) = components.insert(entity, &tags::NAME, ComponentValue::Name(definition.name.clone())) {
        tracing::error!(%uuid, error = %e, "could not name scene entity");
    }

    let mut failed = 0;
    for component in &definition.components {
        if let Err(e) = load_component(registry, components, entity, component) {
            failed += 1;
            tracing::warn!(
                %uuid,
                name = %definition.name,
                component = %component.name,
                error = %e,
                "error loading scene entity component"
            );
        }
    }

    if !components.has(entity, &tags::VISIBLE) {
        if let Some(object) = components.object3d_mut(entity) {
            object.visible = false;
        }
    }
    failed
}
