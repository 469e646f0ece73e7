use metaspace_common::{EntityUuid, SceneDocument};
use metaspace_scene::ComponentRegistry;
use metaspace_stream::{LoadMode, split_lazy_loaded};

/// Static checks of a scene document, without loading it.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub entity_count: usize,
    pub immediate: usize,
    pub deferred: usize,
    /// (entity, parent) where the parent is neither the root nor declared.
    pub dangling_parents: Vec<(EntityUuid, EntityUuid)>,
    /// Non-root entities without a parent.
    pub unparented: Vec<EntityUuid>,
    /// Dynamically loaded entities that can never be placed.
    pub unplaceable: Vec<String>,
    /// Component names the registry does not know. Warnings only.
    pub unknown_components: Vec<(EntityUuid, String)>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.dangling_parents.is_empty() && self.unparented.is_empty() && self.unplaceable.is_empty()
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "entities={} immediate={} deferred={}",
            self.entity_count, self.immediate, self.deferred
        )?;
        for (uuid, parent) in &self.dangling_parents {
            writeln!(f, "error: {uuid} references missing parent {parent}")?;
        }
        for uuid in &self.unparented {
            writeln!(f, "error: {uuid} has no parent")?;
        }
        for reason in &self.unplaceable {
            writeln!(f, "error: {reason}")?;
        }
        for (uuid, name) in &self.unknown_components {
            writeln!(f, "warning: {uuid} uses unknown component `{name}`")?;
        }
        Ok(())
    }
}

pub fn validate_document(document: &SceneDocument, registry: &ComponentRegistry) -> ValidationReport {
    let mut report = ValidationReport {
        entity_count: document.entities.len(),
        ..ValidationReport::default()
    };

    for (uuid, definition) in document.non_root_entities() {
        match &definition.parent {
            None => report.unparented.push(uuid.clone()),
            Some(parent) if *parent != document.root && !document.entities.contains_key(parent) => {
                report.dangling_parents.push((uuid.clone(), parent.clone()));
            }
            Some(_) => {}
        }
        for component in &definition.components {
            if registry.resolve(&component.name).is_none() {
                report
                    .unknown_components
                    .push((uuid.clone(), component.name.clone()));
            }
        }
    }

    let partition = split_lazy_loaded(document, LoadMode::Runtime);
    report.immediate = partition.immediate.len();
    report.deferred = partition.deferred.len();
    report.unplaceable = partition.rejected.iter().map(|e| e.to_string()).collect();

    tracing::debug!(
        entities = report.entity_count,
        valid = report.is_valid(),
        "validated scene document"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> SceneDocument {
        SceneDocument::from_json_value(value).unwrap()
    }

    #[test]
    fn clean_document_is_valid() {
        let report = validate_document(
            &doc(json!({
                "root": "R",
                "entities": {
                    "R": { "name": "root" },
                    "A": { "name": "A", "parent": "R", "components": [{ "name": "visible" }] },
                    "B": { "name": "B", "parent": "A" }
                }
            })),
            &ComponentRegistry::with_builtins(),
        );
        assert!(report.is_valid(), "{report}");
        assert_eq!(report.entity_count, 3);
        assert_eq!(report.immediate, 2);
    }

    #[test]
    fn problems_are_reported() {
        let report = validate_document(
            &doc(json!({
                "root": "R",
                "entities": {
                    "A": { "name": "A", "parent": "ghost" },
                    "B": { "name": "B" },
                    "C": {
                        "name": "C",
                        "parent": "R",
                        "components": [
                            { "name": "dynamic-load", "props": { "distance": 4 } },
                            { "name": "Sparkle" }
                        ]
                    }
                }
            })),
            &ComponentRegistry::with_builtins(),
        );
        assert!(!report.is_valid());
        assert_eq!(
            report.dangling_parents,
            vec![(EntityUuid::from("A"), EntityUuid::from("ghost"))]
        );
        assert_eq!(report.unparented, vec![EntityUuid::from("B")]);
        assert_eq!(report.unplaceable.len(), 1);
        assert_eq!(
            report.unknown_components,
            vec![(EntityUuid::from("C"), "Sparkle".to_string())]
        );
        assert!(report.to_string().contains("missing parent ghost"));
    }
}
