//! UUID rewriting for entities merged into a tree that already uses their
//! UUIDs.
//!
//! Rewriting is a pure transform: rewrites are collected against the input
//! definition first, then applied to a copy.

use metaspace_common::{EntityDefinition, EntityUuid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::registry::ComponentRegistry;

/// Which strings in a definition count as entity references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePolicy {
    /// Any string anywhere in the definition, the entity name included.
    #[default]
    AnyString,
    /// `parent` plus the prop paths each component registration declares.
    /// Strings that only happen to equal a remapped UUID are left alone.
    Declared,
}

/// Old UUID → freshly generated UUID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UuidRemap {
    map: BTreeMap<EntityUuid, EntityUuid>,
}

impl UuidRemap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, old: EntityUuid, new: EntityUuid) {
        self.map.insert(old, new);
    }

    pub fn get(&self, old: &EntityUuid) -> Option<&EntityUuid> {
        self.map.get(old)
    }

    /// The remapped UUID, or `uuid` itself when it was not remapped.
    pub fn resolve(&self, uuid: &EntityUuid) -> EntityUuid {
        self.map.get(uuid).unwrap_or(uuid).clone()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityUuid, &EntityUuid)> {
        self.map.iter()
    }
}

/// Where a reference lives inside an [`EntityDefinition`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Name,
    Parent,
    ComponentName(usize),
    /// JSON pointer into `components[index].props`.
    Prop(usize, String),
}

#[derive(Debug)]
struct Rewrite {
    location: Location,
    value: String,
}

/// Every candidate reference location with its current string value.
fn candidates(
    definition: &EntityDefinition,
    policy: ReferencePolicy,
    registry: &ComponentRegistry,
) -> Vec<(Location, String)> {
    let mut out = Vec::new();
    if let Some(parent) = &definition.parent {
        out.push((Location::Parent, parent.0.clone()));
    }
    match policy {
        ReferencePolicy::Declared => {
            for (index, component) in definition.components.iter().enumerate() {
                for pointer in registry.entity_references(&component.name) {
                    match component.props.pointer(pointer) {
                        Some(serde_json::Value::String(s)) => {
                            out.push((Location::Prop(index, pointer.clone()), s.clone()));
                        }
                        Some(serde_json::Value::Array(items)) => {
                            for (i, item) in items.iter().enumerate() {
                                if let serde_json::Value::String(s) = item {
                                    out.push((Location::Prop(index, format!("{pointer}/{i}")), s.clone()));
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        ReferencePolicy::AnyString => {
            out.push((Location::Name, definition.name.clone()));
            for (index, component) in definition.components.iter().enumerate() {
                out.push((Location::ComponentName(index), component.name.clone()));
                let mut frontier = vec![(String::new(), &component.props)];
                while let Some((pointer, value)) = frontier.pop() {
                    match value {
                        serde_json::Value::String(s) => {
                            out.push((Location::Prop(index, pointer), s.clone()));
                        }
                        serde_json::Value::Array(items) => {
                            for (i, item) in items.iter().enumerate() {
                                frontier.push((format!("{pointer}/{i}"), item));
                            }
                        }
                        serde_json::Value::Object(map) => {
                            for (key, item) in map {
                                frontier.push((format!("{pointer}/{}", escape_pointer(key)), item));
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }
    out
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Rewrite every reference to a remapped UUID, returning a new definition.
pub fn remap_definition(
    definition: &EntityDefinition,
    remap: &UuidRemap,
    policy: ReferencePolicy,
    registry: &ComponentRegistry,
) -> EntityDefinition {
    let mut out = definition.clone();
    if remap.is_empty() {
        return out;
    }

    let rewrites: Vec<Rewrite> = candidates(definition, policy, registry)
        .into_iter()
        .filter_map(|(location, value)| {
            remap.get(&EntityUuid(value)).map(|new| Rewrite {
                location,
                value: new.0.clone(),
            })
        })
        .collect();

    for rewrite in rewrites {
        match rewrite.location {
            Location::Name => out.name = rewrite.value,
            Location::Parent => out.parent = Some(EntityUuid(rewrite.value)),
            Location::ComponentName(index) => out.components[index].name = rewrite.value,
            Location::Prop(index, pointer) => {
                if let Some(slot) = out.components[index].props.pointer_mut(&pointer) {
                    *slot = serde_json::Value::String(rewrite.value);
                }
            }
        }
    }
    out
}

/// Number of candidate reference locations still holding `uuid`.
pub fn scan_references(
    definition: &EntityDefinition,
    uuid: &EntityUuid,
    policy: ReferencePolicy,
    registry: &ComponentRegistry,
) -> usize {
    candidates(definition, policy, registry)
        .iter()
        .filter(|(_, value)| *value == uuid.0)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegisteredComponent;
    use metaspace_common::ComponentDefinition;
    use serde_json::json;

    fn registry() -> ComponentRegistry {
        let mut r = ComponentRegistry::with_builtins();
        r.register(
            RegisteredComponent::new("follow")
                .with_reference("/target")
                .with_reference("/waypoints"),
        );
        r
    }

    fn definition() -> EntityDefinition {
        EntityDefinition::new("old-a")
            .with_parent("old-p")
            .with_component(ComponentDefinition::new(
                "follow",
                json!({ "target": "old-a", "waypoints": ["old-p", "keep"], "label": "old-a" }),
            ))
            .with_component(ComponentDefinition::new(
                "note",
                json!({ "nested": { "ref": ["old-a"] }, "a/b": "old-p" }),
            ))
    }

    fn remap() -> UuidRemap {
        let mut m = UuidRemap::new();
        m.insert("old-a".into(), "new-a".into());
        m.insert("old-p".into(), "new-p".into());
        m
    }

    #[test]
    fn declared_policy_leaves_incidental_matches() {
        let r = registry();
        let def = definition();
        let out = remap_definition(&def, &remap(), ReferencePolicy::Declared, &r);

        assert_eq!(out.parent, Some(EntityUuid::from("new-p")));
        assert_eq!(out.components[0].props["target"], json!("new-a"));
        assert_eq!(out.components[0].props["waypoints"], json!(["new-p", "keep"]));
        // incidental matches stay
        assert_eq!(out.name, "old-a");
        assert_eq!(out.components[0].props["label"], json!("old-a"));
        assert_eq!(out.components[1].props["nested"]["ref"], json!(["old-a"]));

        for old in ["old-a", "old-p"] {
            assert_eq!(scan_references(&out, &old.into(), ReferencePolicy::Declared, &r), 0);
        }
        assert_eq!(scan_references(&out, &"old-a".into(), ReferencePolicy::AnyString, &r), 3);
    }

    #[test]
    fn any_string_policy_rewrites_everything() {
        let r = registry();
        let out = remap_definition(&definition(), &remap(), ReferencePolicy::AnyString, &r);
        assert_eq!(out.name, "new-a");
        assert_eq!(out.components[0].props["label"], json!("new-a"));
        assert_eq!(out.components[1].props["nested"]["ref"], json!(["new-a"]));
        assert_eq!(out.components[1].props["a/b"], json!("new-p"));
        for old in ["old-a", "old-p"] {
            assert_eq!(scan_references(&out, &old.into(), ReferencePolicy::AnyString, &r), 0);
        }
    }

    #[test]
    fn default_policy_leaves_no_old_uuid() {
        let r = registry();
        let out = remap_definition(&definition(), &remap(), ReferencePolicy::default(), &r);
        let text = serde_json::to_string(&out).unwrap();
        assert!(!text.contains("old-a"), "{text}");
        assert!(!text.contains("old-p"), "{text}");
        assert!(text.contains("keep"));
    }

    #[test]
    fn input_is_not_mutated() {
        let r = registry();
        let def = definition();
        let before = def.clone();
        let _ = remap_definition(&def, &remap(), ReferencePolicy::AnyString, &r);
        assert_eq!(def, before);
    }

    #[test]
    fn empty_remap_is_identity() {
        let r = registry();
        let def = definition();
        assert_eq!(
            remap_definition(&def, &UuidRemap::new(), ReferencePolicy::AnyString, &r),
            def
        );
    }

    #[test]
    fn resolve_falls_back_to_input() {
        let m = remap();
        assert_eq!(m.resolve(&"old-a".into()), EntityUuid::from("new-a"));
        assert_eq!(m.resolve(&"other".into()), EntityUuid::from("other"));
    }
}
