//! The scene context: one entity tree plus everything that feeds it.
//!
//! # Invariants
//! - At most one document load is in flight; everything that mutates the tree
//!   from a document is rejected meanwhile.
//! - A full load tears down the previous scene before the new root exists.
//! - A deferred UUID is materialized at most once.
//! - Pending-asset markers reach the tracker only through component events.

use glam::Vec3;
use metaspace_assets::{AssetOutcome, SettlementEvent, SettlementState, SettlementTracker};
use metaspace_common::{Entity, EntityDefinition, EntityUuid, SceneDocument};
use metaspace_ecs::{ComponentEvent, ComponentStore, ComponentValue, tags};
use metaspace_kernel::EntityStore;
use metaspace_stream::{DeferredSet, ProximityStreamer, split_lazy_loaded};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::SceneConfig;
use crate::error::{SceneError, TreeError};
use crate::loader::load_scene_entity;
use crate::registry::ComponentRegistry;
use crate::remap::{UuidRemap, remap_definition};
use crate::tree::{EntityTree, TreeNode};

/// Signals for the renderer and UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SceneEvent {
    LoadingProgress { progress: u8 },
    SceneLoaded,
    /// A full load is replacing the scene; drop per-scene render state.
    RendererReset,
}

impl From<SettlementEvent> for SceneEvent {
    fn from(event: SettlementEvent) -> Self {
        match event {
            SettlementEvent::LoadingProgress { progress } => Self::LoadingProgress { progress },
            SettlementEvent::SceneLoaded => Self::SceneLoaded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    InProgress { materialized: usize, total: usize },
    /// Root-attached entities created by the load, in document order.
    Complete { top_level: Vec<Entity> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadKind {
    Full,
    Incremental,
}

#[derive(Debug)]
struct PendingEntity {
    node: TreeNode,
    /// Already rewritten against the live tree.
    definition: EntityDefinition,
}

#[derive(Debug)]
struct LoadJob {
    kind: LoadKind,
    entries: Vec<PendingEntity>,
    cursor: usize,
}

pub struct SceneWorld {
    config: SceneConfig,
    registry: Arc<ComponentRegistry>,
    entities: EntityStore,
    components: ComponentStore,
    tree: EntityTree,
    deferred: DeferredSet,
    streamer: ProximityStreamer,
    tracker: SettlementTracker,
    pending_load: Option<LoadJob>,
    events: Vec<SceneEvent>,
}

impl SceneWorld {
    /// An empty scene: a root with a generated UUID and nothing else.
    pub fn new(config: SceneConfig, registry: ComponentRegistry) -> Result<Self, SceneError> {
        config.validate()?;
        let mut components = ComponentStore::new();
        for tag in registry.tags() {
            components.register(tag.clone());
        }
        let mut entities = EntityStore::new();
        let root = entities.create();
        Ok(Self {
            deferred: DeferredSet::new(config.stream.cell_size),
            streamer: ProximityStreamer::new(config.stream.clone()),
            config,
            registry: Arc::new(registry),
            entities,
            components,
            tree: EntityTree::new(root, EntityUuid::generate()),
            tracker: SettlementTracker::new(),
            pending_load: None,
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn tree(&self) -> &EntityTree {
        &self.tree
    }

    pub fn components(&self) -> &ComponentStore {
        &self.components
    }

    /// Mutable component access for systems outside the loader, e.g. asset
    /// fetchers removing pending markers. Call [`SceneWorld::step`] afterwards
    /// so the tracker sees the changes.
    pub fn components_mut(&mut self) -> &mut ComponentStore {
        &mut self.components
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn deferred(&self) -> &DeferredSet {
        &self.deferred
    }

    pub fn streamer(&self) -> &ProximityStreamer {
        &self.streamer
    }

    pub fn settlement_state(&self) -> SettlementState {
        self.tracker.state()
    }

    pub fn pending_assets(&self) -> usize {
        self.tracker.remaining()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_load.is_some()
    }

    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[SceneEvent] {
        &self.events
    }

    /// Replace the current scene with `document`, materializing it over the
    /// following [`SceneWorld::step`] calls.
    pub fn begin_scene_load(&mut self, document: &SceneDocument) -> Result<(), SceneError> {
        if self.pending_load.is_some() {
            tracing::warn!(root = %document.root, "scene load rejected, another load is in flight");
            return Err(SceneError::LoadInProgress);
        }
        let _span = tracing::info_span!("scene_load", root = %document.root).entered();
        tracing::info!(entities = document.entities.len(), "loading scene");

        self.events.push(SceneEvent::LoadingProgress { progress: 0 });
        self.teardown();
        self.events.push(SceneEvent::RendererReset);

        let root = self.entities.create();
        self.tree = EntityTree::new(root, document.root.clone());
        self.tracker.begin();

        let partition = split_lazy_loaded(document, self.config.mode);
        tracing::debug!(
            immediate = partition.immediate.len(),
            deferred = partition.deferred.len(),
            rejected = partition.rejected.len(),
            "partitioned scene entities"
        );
        for entry in partition.deferred {
            self.deferred.insert(entry);
        }
        let immediate: BTreeSet<EntityUuid> = partition.immediate.into_iter().collect();

        match document.root_definition() {
            Some(definition) => {
                load_scene_entity(&self.registry, &mut self.components, root, &document.root, definition);
            }
            None => {
                if let Err(e) = self.components.insert(
                    root,
                    &tags::NAME,
                    ComponentValue::Name(document.root.to_string()),
                ) {
                    tracing::error!(error = %e, "could not name scene root");
                }
            }
        }

        let job = self.prepare_job(document, Some(&immediate), LoadKind::Full);
        self.pending_load = Some(job);
        Ok(())
    }

    /// Advance one engine tick: materialize up to `entities_per_tick`
    /// entities of an in-flight load and feed marker changes to the tracker.
    pub fn step(&mut self) -> Option<LoadStatus> {
        let tick = self.entities.step();
        let churn = self.entities.drain_events().len();
        let status = self.pump_load(self.config.entities_per_tick);
        self.sync_settlement();
        tracing::trace!(tick, churn, "scene step");
        status
    }

    /// Full load run to completion. Returns the root-attached entities.
    pub fn load_scene(&mut self, document: &SceneDocument) -> Result<Vec<Entity>, SceneError> {
        self.begin_scene_load(document)?;
        loop {
            match self.pump_load(usize::MAX) {
                Some(LoadStatus::Complete { top_level }) => return Ok(top_level),
                Some(LoadStatus::InProgress { .. }) => continue,
                None => return Ok(Vec::new()),
            }
        }
    }

    /// Merge `document` into the live tree without tearing anything down.
    ///
    /// Colliding UUIDs get fresh ones; children of the document root attach
    /// to the live root.
    pub fn load_ecs_data(&mut self, document: &SceneDocument) -> Result<Vec<Entity>, SceneError> {
        if self.pending_load.is_some() {
            return Err(SceneError::LoadInProgress);
        }
        let _span = tracing::info_span!("scene_merge", root = %document.root).entered();
        let job = self.prepare_job(document, None, LoadKind::Incremental);
        self.pending_load = Some(job);
        match self.pump_load(usize::MAX) {
            Some(LoadStatus::Complete { top_level }) => Ok(top_level),
            _ => Ok(Vec::new()),
        }
    }

    /// Create one entity under the parent its definition names and
    /// materialize it.
    pub fn create_scene_entity(
        &mut self,
        uuid: EntityUuid,
        definition: &EntityDefinition,
    ) -> Result<Entity, SceneError> {
        if self.pending_load.is_some() {
            return Err(SceneError::LoadInProgress);
        }
        let parent_uuid = definition
            .parent
            .as_ref()
            .ok_or_else(|| TreeError::MissingParent(uuid.clone()))?;
        let parent = self
            .tree
            .entity_of(parent_uuid)
            .ok_or_else(|| TreeError::ParentNotFound(parent_uuid.to_string()))?;
        if self.tree.contains_uuid(&uuid) {
            return Err(TreeError::DuplicateUuid(uuid).into());
        }

        let entity = self.entities.create();
        if let Err(e) = self.tree.add_node(TreeNode::new(entity, uuid.clone()), Some(parent)) {
            self.entities.release(entity);
            return Err(e.into());
        }
        load_scene_entity(&self.registry, &mut self.components, entity, &uuid, definition);
        self.sync_settlement();
        tracing::debug!(%uuid, %entity, "created scene entity");
        Ok(entity)
    }

    /// Materialize one deferred entity.
    ///
    /// `Ok(None)` when the UUID is not deferred or already in the tree. An
    /// entry whose parent has not been materialized yet stays deferred and
    /// the error is returned.
    pub fn materialize_deferred(&mut self, uuid: &EntityUuid) -> Result<Option<Entity>, SceneError> {
        if self.pending_load.is_some() {
            return Err(SceneError::LoadInProgress);
        }
        if self.tree.contains_uuid(uuid) {
            if self.deferred.remove(uuid).is_some() {
                tracing::debug!(%uuid, "dropping deferred entry for an entity already in the tree");
            }
            return Ok(None);
        }
        let Some(entry) = self.deferred.get(uuid) else {
            return Ok(None);
        };
        if let Some(parent) = &entry.definition.parent {
            if !self.tree.contains_uuid(parent) {
                return Err(TreeError::ParentNotFound(parent.to_string()).into());
            }
        }
        let Some(entry) = self.deferred.remove(uuid) else {
            return Ok(None);
        };
        self.create_scene_entity(entry.uuid, &entry.definition).map(Some)
    }

    /// Materialize the deferred entities `observer` is close enough to,
    /// within the configured budget.
    pub fn update_dynamic_load(&mut self, observer: Vec3) -> Result<Vec<Entity>, SceneError> {
        if self.pending_load.is_some() {
            return Err(SceneError::LoadInProgress);
        }
        let due = self.streamer.update(observer, &self.deferred);
        let mut created = Vec::with_capacity(due.len());
        for uuid in due {
            match self.materialize_deferred(&uuid) {
                Ok(Some(entity)) => created.push(entity),
                Ok(None) => {}
                Err(e) => tracing::warn!(%uuid, error = %e, "deferred entity not materialized"),
            }
        }
        if !created.is_empty() {
            tracing::debug!(
                materialized = created.len(),
                remaining = self.deferred.len(),
                "dynamic load triggered"
            );
        }
        Ok(created)
    }

    /// Create a fresh node under `parent` from a registered prefab.
    ///
    /// `Ok(None)` when no prefab has that name.
    pub fn create_editor_node(&mut self, parent: Entity, prefab: &str) -> Result<Option<Entity>, SceneError> {
        let registry = Arc::clone(&self.registry);
        let Some(components) = registry.prefab(prefab) else {
            tracing::warn!(prefab, "not a prefab");
            return Ok(None);
        };
        let parent_uuid = self
            .tree
            .get(parent)
            .ok_or(TreeError::NodeNotFound(parent))?
            .uuid
            .clone();
        let definition = EntityDefinition {
            name: prefab.to_string(),
            parent: Some(parent_uuid),
            components: components.to_vec(),
        };
        self.create_scene_entity(EntityUuid::generate(), &definition)
            .map(Some)
    }

    /// Remove `entity` and its subtree, releasing entities and components.
    /// Returns how many nodes went away.
    pub fn remove_entity_node(&mut self, entity: Entity) -> Result<usize, SceneError> {
        if self.pending_load.is_some() {
            return Err(SceneError::LoadInProgress);
        }
        let removed = self.tree.remove_node(entity)?;
        for node in &removed {
            self.components.remove_entity(node.entity);
            self.entities.release(node.entity);
        }
        self.sync_settlement();
        tracing::debug!(%entity, removed = removed.len(), "removed scene entity");
        Ok(removed.len())
    }

    /// Drop the whole scene, root included, leaving a fresh empty tree.
    /// Cancels an in-flight load.
    pub fn unload_scene(&mut self) {
        tracing::info!(nodes = self.tree.len(), "unloading scene");
        self.teardown();
        let root = self.entities.create();
        self.tree = EntityTree::new(root, EntityUuid::generate());
    }

    /// An external asset fetch for `entity` ended. Failures count as settled.
    ///
    /// Returns whether a pending marker was removed.
    pub fn settle_asset(&mut self, entity: Entity, outcome: AssetOutcome) -> Result<bool, SceneError> {
        if !self.entities.is_alive(entity) {
            return Err(SceneError::UnknownEntity(entity));
        }
        if let AssetOutcome::Failed(reason) = &outcome {
            tracing::warn!(%entity, reason = %reason, "asset failed to load, treating as settled");
        }
        let removed = self.components.remove(entity, &tags::ASSET_PENDING).is_some();
        self.sync_settlement();
        Ok(removed)
    }

    /// Release every entity, clear components and deferred entries, and
    /// forget tracker state. Leaves the tree pointing at a released root;
    /// callers rebuild it.
    fn teardown(&mut self) {
        if self.pending_load.take().is_some() {
            tracing::debug!("cancelling in-flight scene load");
        }
        let live: Vec<Entity> = self.entities.iter().collect();
        for entity in live {
            self.components.remove_entity(entity);
            self.entities.release(entity);
        }
        self.entities.drain_events();
        self.components.drain_events();
        self.deferred.clear();
        self.tracker.reset();
    }

    /// Allocate entities for the selected document entries and rewrite their
    /// definitions against the live tree.
    fn prepare_job(
        &mut self,
        document: &SceneDocument,
        selection: Option<&BTreeSet<EntityUuid>>,
        kind: LoadKind,
    ) -> LoadJob {
        let selected: Vec<_> = document
            .non_root_entities()
            .filter(|(uuid, _)| selection.is_none_or(|s| s.contains(*uuid)))
            .collect();

        let mut remap = UuidRemap::new();
        for (uuid, _) in &selected {
            if self.tree.contains_uuid(uuid) {
                let fresh = EntityUuid::generate();
                tracing::debug!(old = %uuid, new = %fresh, "remapping colliding scene entity UUID");
                remap.insert((*uuid).clone(), fresh);
            }
        }

        let live_root = self.tree.root_uuid().clone();
        let mut entries = Vec::with_capacity(selected.len());
        for (uuid, definition) in selected {
            let mut definition =
                remap_definition(definition, &remap, self.config.reference_policy, &self.registry);
            if definition.parent.as_ref() == Some(&document.root) {
                definition.parent = Some(live_root.clone());
            }
            let entity = self.entities.create();
            entries.push(PendingEntity {
                node: TreeNode::new(entity, remap.resolve(uuid)),
                definition,
            });
        }
        LoadJob {
            kind,
            entries,
            cursor: 0,
        }
    }

    fn pump_load(&mut self, budget: usize) -> Option<LoadStatus> {
        let job = self.pending_load.as_mut()?;
        let total = job.entries.len();
        let end = job.cursor.saturating_add(budget).min(total);
        for pending in &job.entries[job.cursor..end] {
            load_scene_entity(
                &self.registry,
                &mut self.components,
                pending.node.entity,
                &pending.node.uuid,
                &pending.definition,
            );
        }
        job.cursor = end;
        if end < total {
            return Some(LoadStatus::InProgress {
                materialized: end,
                total,
            });
        }

        let job = self.pending_load.take()?;
        let kind = job.kind;
        let top_level = self.link_job(job);
        if kind == LoadKind::Full {
            let root = self.tree.root();
            if let Err(e) = self.components.insert(root, &tags::SCENE, ComponentValue::Tag) {
                tracing::error!(error = %e, "could not tag scene root");
            }
        }
        self.sync_settlement();
        if kind == LoadKind::Full {
            self.tracker.finish_deserialization();
            self.sync_settlement();
            tracing::info!(
                top_level = top_level.len(),
                nodes = self.tree.len(),
                deferred = self.deferred.len(),
                pending_assets = self.tracker.remaining(),
                "scene deserialized"
            );
        }
        Some(LoadStatus::Complete { top_level })
    }

    /// Link every prepared node under its parent, parents first.
    fn link_job(&mut self, job: LoadJob) -> Vec<Entity> {
        let root = self.tree.root();
        let root_uuid = self.tree.root_uuid().clone();
        let order = link_order(&job.entries, &root_uuid);
        let mut slots: Vec<Option<PendingEntity>> = job.entries.into_iter().map(Some).collect();

        let mut top_level = Vec::new();
        for index in order {
            let Some(pending) = slots[index].take() else {
                continue;
            };
            let uuid = pending.node.uuid.clone();
            let Some(parent_uuid) = pending.definition.parent else {
                tracing::warn!(%uuid, "scene entity has no parent, leaving it unlinked");
                continue;
            };
            let parent = if parent_uuid == root_uuid {
                Some(root)
            } else {
                self.tree.entity_of(&parent_uuid)
            };
            let Some(parent) = parent else {
                tracing::error!(%uuid, parent = %parent_uuid, "parent of scene entity is not in the tree");
                continue;
            };
            match self.tree.add_node(pending.node, Some(parent)) {
                Ok(entity) if parent == root => top_level.push((index, entity)),
                Ok(_) => {}
                Err(e) => tracing::error!(%uuid, error = %e, "could not link scene entity"),
            }
        }
        top_level.sort_by_key(|(index, _)| *index);
        top_level.into_iter().map(|(_, entity)| entity).collect()
    }

    fn sync_settlement(&mut self) {
        for event in self.components.drain_events() {
            match event {
                ComponentEvent::Added { tag, .. } if tag == tags::ASSET_PENDING => {
                    self.tracker.pending_added();
                }
                ComponentEvent::Removed { tag, .. } if tag == tags::ASSET_PENDING => {
                    self.tracker.pending_removed();
                }
                _ => {}
            }
        }
        self.events
            .extend(self.tracker.drain_events().into_iter().map(SceneEvent::from));
    }
}

/// Job indices ordered by depth within the job, then document order, so a
/// parent declared later still links before its children. Entries on a
/// parent cycle are dropped.
fn link_order(entries: &[PendingEntity], root_uuid: &EntityUuid) -> Vec<usize> {
    let index: BTreeMap<&EntityUuid, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, pending)| (&pending.node.uuid, i))
        .collect();

    let mut ranked = Vec::with_capacity(entries.len());
    for (i, pending) in entries.iter().enumerate() {
        let mut depth = 0usize;
        let mut cursor = pending.definition.parent.as_ref();
        let mut cyclic = false;
        while let Some(parent) = cursor {
            if parent == root_uuid {
                break;
            }
            let Some(&j) = index.get(parent) else {
                break;
            };
            depth += 1;
            if depth > entries.len() {
                cyclic = true;
                break;
            }
            cursor = entries[j].definition.parent.as_ref();
        }
        if cyclic {
            tracing::error!(uuid = %pending.node.uuid, "scene entity is on a parent cycle, leaving it unlinked");
            continue;
        }
        ranked.push((depth, i));
    }
    ranked.sort_unstable();
    ranked.into_iter().map(|(_, i)| i).collect()
}
