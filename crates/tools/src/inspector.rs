use glam::Vec3;
use metaspace_assets::SettlementState;
use metaspace_common::{Entity, EntityUuid};
use metaspace_scene::SceneWorld;
use std::fmt::Write as _;

/// Scene inspector for developer tooling.
///
/// Read-only queries against a [`SceneWorld`] for debugging and the CLI.
pub struct SceneInspector;

impl SceneInspector {
    pub fn summary(world: &SceneWorld) -> SceneSummary {
        SceneSummary {
            tick: world.entities().tick(),
            root: world.tree().root_uuid().clone(),
            entity_count: world.entities().len(),
            node_count: world.tree().len(),
            deferred_count: world.deferred().len(),
            pending_assets: world.pending_assets(),
            settlement: world.settlement_state(),
            loading: world.is_loading(),
        }
    }

    pub fn inspect_entity(world: &SceneWorld, entity: Entity) -> Option<EntityInfo> {
        let node = world.tree().get(entity)?;
        let components = world.components();
        Some(EntityInfo {
            entity,
            uuid: node.uuid.clone(),
            name: components.name(entity).map(str::to_string),
            parent: node
                .parent
                .and_then(|p| world.tree().get(p))
                .map(|p| p.uuid.clone()),
            children: node.children.len(),
            components: components
                .tags_of(entity)
                .into_iter()
                .map(|tag| tag.to_string())
                .collect(),
            position: components.transform(entity).map(|t| t.position.to_array()),
            visible: components.object3d(entity).map(|o| o.visible),
        })
    }

    /// One line per node, pre-order, indented by depth.
    pub fn dump_tree(world: &SceneWorld) -> String {
        let mut out = String::new();
        for (entity, depth) in world.tree().depth_first() {
            let Some(node) = world.tree().get(entity) else {
                continue;
            };
            let name = world.components().name(entity).unwrap_or("<unnamed>");
            let tags: Vec<String> = world
                .components()
                .tags_of(entity)
                .into_iter()
                .map(|tag| tag.to_string())
                .collect();
            let _ = writeln!(
                out,
                "{:indent$}{name} [{}] {entity} ({})",
                "",
                node.uuid,
                tags.join(", "),
                indent = depth * 2
            );
        }
        out
    }

    /// Deferred entries nearest first, with whether `observer` triggers them.
    pub fn deferred_by_distance(world: &SceneWorld, observer: Vec3) -> Vec<DeferredInfo> {
        let mut out: Vec<DeferredInfo> = world
            .deferred()
            .iter()
            .map(|entry| DeferredInfo {
                uuid: entry.uuid.clone(),
                name: entry.definition.name.clone(),
                distance: observer.distance(entry.position),
                trigger_distance: entry.trigger_distance_squared.sqrt(),
                due: entry.is_triggered_by(observer),
            })
            .collect();
        out.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        out
    }
}

#[derive(Debug, Clone)]
pub struct SceneSummary {
    pub tick: u64,
    pub root: EntityUuid,
    pub entity_count: usize,
    pub node_count: usize,
    pub deferred_count: usize,
    pub pending_assets: usize,
    pub settlement: SettlementState,
    pub loading: bool,
}

impl std::fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scene {}: tick={} entities={} nodes={} deferred={} pending_assets={} state={:?}{}",
            self.root,
            self.tick,
            self.entity_count,
            self.node_count,
            self.deferred_count,
            self.pending_assets,
            self.settlement,
            if self.loading { " (loading)" } else { "" }
        )
    }
}

#[derive(Debug, Clone)]
pub struct EntityInfo {
    pub entity: Entity,
    pub uuid: EntityUuid,
    pub name: Option<String>,
    pub parent: Option<EntityUuid>,
    pub children: usize,
    pub components: Vec<String>,
    pub position: Option<[f32; 3]>,
    pub visible: Option<bool>,
}

impl std::fmt::Display for EntityInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} [{}] children={}",
            self.entity,
            self.name.as_deref().unwrap_or("<unnamed>"),
            self.uuid,
            self.children
        )?;
        if let Some([x, y, z]) = self.position {
            write!(f, " pos=({x:.2}, {y:.2}, {z:.2})")?;
        }
        if let Some(visible) = self.visible {
            write!(f, " visible={visible}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DeferredInfo {
    pub uuid: EntityUuid,
    pub name: String,
    pub distance: f32,
    pub trigger_distance: f32,
    pub due: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaspace_common::SceneDocument;
    use metaspace_scene::{ComponentRegistry, SceneConfig};
    use serde_json::json;

    fn world() -> SceneWorld {
        let mut w = SceneWorld::new(SceneConfig::default(), ComponentRegistry::with_builtins()).unwrap();
        let doc = SceneDocument::from_json_value(json!({
            "root": "R",
            "entities": {
                "A": {
                    "name": "Lamp",
                    "parent": "R",
                    "components": [
                        { "name": "transform", "props": { "position": { "x": 1, "y": 2, "z": 3 } } },
                        { "name": "model", "props": { "src": "lamp.glb" } },
                        { "name": "visible" }
                    ]
                },
                "B": { "name": "Shade", "parent": "A" },
                "far": {
                    "name": "Tower",
                    "parent": "R",
                    "components": [
                        { "name": "transform", "props": { "position": { "x": 50, "y": 0, "z": 0 } } },
                        { "name": "dynamic-load", "props": { "distance": 20 } }
                    ]
                }
            }
        }))
        .unwrap();
        w.load_scene(&doc).unwrap();
        w
    }

    #[test]
    fn summary_counts() {
        let w = world();
        let summary = SceneInspector::summary(&w);
        assert_eq!(summary.node_count, 3);
        assert_eq!(summary.entity_count, 3);
        assert_eq!(summary.deferred_count, 1);
        assert_eq!(summary.pending_assets, 1);
        assert_eq!(summary.settlement, SettlementState::Loading);
        assert!(!summary.loading);
        assert!(format!("{summary}").contains("deferred=1"));
    }

    #[test]
    fn inspect_entity_found() {
        let w = world();
        let a = w.tree().entity_of(&"A".into()).unwrap();
        let info = SceneInspector::inspect_entity(&w, a).unwrap();
        assert_eq!(info.name.as_deref(), Some("Lamp"));
        assert_eq!(info.parent, Some(EntityUuid::from("R")));
        assert_eq!(info.children, 1);
        assert_eq!(info.position, Some([1.0, 2.0, 3.0]));
        assert_eq!(info.visible, Some(true));
        assert!(info.components.iter().any(|c| c == "Visible"));
    }

    #[test]
    fn inspect_entity_not_found() {
        let w = world();
        assert!(SceneInspector::inspect_entity(&w, Entity(4242)).is_none());
    }

    #[test]
    fn dump_is_indented_preorder() {
        let w = world();
        let dump = SceneInspector::dump_tree(&w);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("R ["));
        assert!(lines[1].starts_with("  Lamp [A]"));
        assert!(lines[2].starts_with("    Shade [B]"));
    }

    #[test]
    fn deferred_sorted_by_distance() {
        let w = world();
        let far = SceneInspector::deferred_by_distance(&w, Vec3::ZERO);
        assert_eq!(far.len(), 1);
        assert_eq!(far[0].name, "Tower");
        assert!(!far[0].due);
        assert_eq!(far[0].trigger_distance, 20.0);

        let near = SceneInspector::deferred_by_distance(&w, Vec3::new(45.0, 0.0, 0.0));
        assert!(near[0].due);
        assert_eq!(near[0].distance, 5.0);
    }
}
