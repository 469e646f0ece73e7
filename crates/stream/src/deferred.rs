use glam::Vec3;
use metaspace_common::{
    DynamicLoadProps, EntityDefinition, EntityUuid, SCENE_COMPONENT_DYNAMIC_LOAD,
    SCENE_COMPONENT_TRANSFORM, SceneDocument, TransformProps,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::grid::GridPartition;

/// Whether dynamic loading applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Entities with a dynamic-load marker wait for an observer to come close.
    #[default]
    Runtime,
    /// Authoring: everything loads immediately.
    Editor,
}

/// Configuration errors of a deferred entity. The entity is skipped.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("entity {uuid} is dynamically loaded but has no transform")]
    MissingPosition { uuid: EntityUuid },
    #[error("entity {uuid} has an invalid transform: {source}")]
    InvalidTransform {
        uuid: EntityUuid,
        source: serde_json::Error,
    },
    #[error("entity {uuid} has an invalid dynamic-load marker: {reason}")]
    InvalidMarker { uuid: EntityUuid, reason: String },
}

/// An entity whose materialization waits for an observer to come in range.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredEntry {
    pub uuid: EntityUuid,
    pub definition: EntityDefinition,
    pub position: Vec3,
    pub trigger_distance_squared: f32,
    /// Position in the source document; materialization follows it so a
    /// parent triggered together with its child is created first.
    pub order: usize,
}

impl DeferredEntry {
    /// Build an entry from a definition carrying the dynamic-load marker.
    ///
    /// Returns `Ok(None)` when the definition has no marker.
    pub fn from_definition(
        uuid: &EntityUuid,
        definition: &EntityDefinition,
        order: usize,
    ) -> Result<Option<Self>, StreamError> {
        let Some(marker) = definition.component(SCENE_COMPONENT_DYNAMIC_LOAD) else {
            return Ok(None);
        };
        let marker: DynamicLoadProps =
            marker
                .props_as()
                .map_err(|e| StreamError::InvalidMarker {
                    uuid: uuid.clone(),
                    reason: e.to_string(),
                })?;
        if !marker.distance.is_finite() || marker.distance < 0.0 {
            return Err(StreamError::InvalidMarker {
                uuid: uuid.clone(),
                reason: format!("distance must be a non-negative number, got {}", marker.distance),
            });
        }

        let transform = definition
            .component(SCENE_COMPONENT_TRANSFORM)
            .ok_or_else(|| StreamError::MissingPosition { uuid: uuid.clone() })?;
        let transform: TransformProps =
            transform
                .props_as()
                .map_err(|source| StreamError::InvalidTransform {
                    uuid: uuid.clone(),
                    source,
                })?;

        Ok(Some(Self {
            uuid: uuid.clone(),
            definition: definition.clone(),
            position: transform.position.into(),
            trigger_distance_squared: marker.distance * marker.distance,
            order,
        }))
    }

    /// Strictly inside the trigger radius.
    pub fn is_triggered_by(&self, observer: Vec3) -> bool {
        observer.distance_squared(self.position) < self.trigger_distance_squared
    }
}

/// Result of splitting a document into immediate and deferred entities.
#[derive(Debug, Default)]
pub struct Partition {
    /// Entities to materialize now, in document order.
    pub immediate: Vec<EntityUuid>,
    pub deferred: Vec<DeferredEntry>,
    /// Marked entities that can never be placed. They are not loaded.
    pub rejected: Vec<StreamError>,
}

/// Split every non-root entity of `document` by its dynamic-load marker.
///
/// In [`LoadMode::Editor`] nothing is deferred.
pub fn split_lazy_loaded(document: &SceneDocument, mode: LoadMode) -> Partition {
    let mut partition = Partition::default();
    for (order, (uuid, definition)) in document.non_root_entities().enumerate() {
        if mode == LoadMode::Editor {
            partition.immediate.push(uuid.clone());
            continue;
        }
        match DeferredEntry::from_definition(uuid, definition, order) {
            Ok(Some(entry)) => partition.deferred.push(entry),
            Ok(None) => partition.immediate.push(uuid.clone()),
            Err(e) => {
                tracing::error!(%uuid, error = %e, "tried to lazily load scene entity without a usable position");
                partition.rejected.push(e);
            }
        }
    }
    partition
}

/// Deferred entities keyed by UUID, indexed by position.
#[derive(Debug, Clone)]
pub struct DeferredSet {
    entries: BTreeMap<EntityUuid, DeferredEntry>,
    grid: GridPartition,
    /// Largest trigger distance seen; bounds the grid search. Never shrinks.
    max_trigger_distance: f32,
}

impl DeferredSet {
    pub fn new(cell_size: f32) -> Self {
        Self {
            entries: BTreeMap::new(),
            grid: GridPartition::new(cell_size),
            max_trigger_distance: 0.0,
        }
    }

    /// Insert an entry, replacing any entry with the same UUID.
    pub fn insert(&mut self, entry: DeferredEntry) {
        if let Some(old) = self.entries.remove(&entry.uuid) {
            self.grid.remove(&old.uuid, old.position);
        }
        self.max_trigger_distance = self
            .max_trigger_distance
            .max(entry.trigger_distance_squared.sqrt());
        self.grid.insert(entry.uuid.clone(), entry.position);
        self.entries.insert(entry.uuid.clone(), entry);
    }

    /// Remove an entry. The first removal wins; later calls return `None`.
    pub fn remove(&mut self, uuid: &EntityUuid) -> Option<DeferredEntry> {
        let entry = self.entries.remove(uuid)?;
        self.grid.remove(uuid, entry.position);
        Some(entry)
    }

    pub fn get(&self, uuid: &EntityUuid) -> Option<&DeferredEntry> {
        self.entries.get(uuid)
    }

    pub fn contains(&self, uuid: &EntityUuid) -> bool {
        self.entries.contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in UUID order.
    pub fn iter(&self) -> impl Iterator<Item = &DeferredEntry> {
        self.entries.values()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.grid.clear();
        self.max_trigger_distance = 0.0;
    }

    /// UUIDs whose trigger radius contains `observer`, in document order,
    /// at most `budget` of them. Entries are not removed.
    pub fn due(&self, observer: Vec3, budget: usize) -> Vec<EntityUuid> {
        if self.entries.is_empty() || budget == 0 {
            return Vec::new();
        }
        let radius = (self.max_trigger_distance / self.grid.cell_size()).ceil() as i32;
        let center = self.grid.position_to_cell(observer);

        let mut due: Vec<&DeferredEntry> = self
            .grid
            .entities_in_radius(center, radius)
            .iter()
            .filter_map(|uuid| self.entries.get(uuid))
            .filter(|entry| entry.is_triggered_by(observer))
            .collect();
        due.sort_by_key(|entry| entry.order);
        due.into_iter()
            .take(budget)
            .map(|entry| entry.uuid.clone())
            .collect()
    }
}
