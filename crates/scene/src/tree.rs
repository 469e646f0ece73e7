//! Parent/child hierarchy over entities, with a UUID index.
//!
//! # Invariants
//! - Exactly one node has no parent: the root fixed at construction.
//! - A UUID appears at most once.
//! - A child is linked only under a parent already in the tree.
//! - Children keep insertion order.

use metaspace_common::{Entity, EntityUuid};
use std::collections::BTreeMap;

use crate::error::TreeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub entity: Entity,
    pub uuid: EntityUuid,
    pub parent: Option<Entity>,
    pub children: Vec<Entity>,
}

impl TreeNode {
    /// A detached node; link it with [`EntityTree::add_node`].
    pub fn new(entity: Entity, uuid: EntityUuid) -> Self {
        Self {
            entity,
            uuid,
            parent: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntityTree {
    root: Entity,
    nodes: BTreeMap<Entity, TreeNode>,
    uuid_index: BTreeMap<EntityUuid, Entity>,
}

impl EntityTree {
    pub fn new(root: Entity, root_uuid: EntityUuid) -> Self {
        let mut nodes = BTreeMap::new();
        let mut uuid_index = BTreeMap::new();
        uuid_index.insert(root_uuid.clone(), root);
        nodes.insert(root, TreeNode::new(root, root_uuid));
        Self {
            root,
            nodes,
            uuid_index,
        }
    }

    pub fn root(&self) -> Entity {
        self.root
    }

    pub fn root_uuid(&self) -> &EntityUuid {
        &self.nodes[&self.root].uuid
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, entity: Entity) -> Option<&TreeNode> {
        self.nodes.get(&entity)
    }

    pub fn lookup(&self, uuid: &EntityUuid) -> Option<&TreeNode> {
        self.uuid_index.get(uuid).and_then(|e| self.nodes.get(e))
    }

    pub fn entity_of(&self, uuid: &EntityUuid) -> Option<Entity> {
        self.uuid_index.get(uuid).copied()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.nodes.contains_key(&entity)
    }

    pub fn contains_uuid(&self, uuid: &EntityUuid) -> bool {
        self.uuid_index.contains_key(uuid)
    }

    pub fn parent_of(&self, entity: Entity) -> Option<Entity> {
        self.nodes.get(&entity).and_then(|n| n.parent)
    }

    pub fn children_of(&self, entity: Entity) -> &[Entity] {
        self.nodes
            .get(&entity)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Link a detached node under `parent`.
    pub fn add_node(&mut self, mut node: TreeNode, parent: Option<Entity>) -> Result<Entity, TreeError> {
        if self.uuid_index.contains_key(&node.uuid) {
            return Err(TreeError::DuplicateUuid(node.uuid));
        }
        if self.nodes.contains_key(&node.entity) {
            return Err(TreeError::DuplicateEntity(node.entity));
        }
        let parent = parent.ok_or_else(|| TreeError::MissingParent(node.uuid.clone()))?;
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or_else(|| TreeError::ParentNotFound(parent.to_string()))?;

        parent_node.children.push(node.entity);
        node.parent = Some(parent);
        node.children.clear();
        let entity = node.entity;
        self.uuid_index.insert(node.uuid.clone(), entity);
        self.nodes.insert(entity, node);
        Ok(entity)
    }

    /// Detach `entity` and its whole subtree.
    ///
    /// Returns the removed nodes, descendants before their parents, so the
    /// caller can release entities and components.
    pub fn remove_node(&mut self, entity: Entity) -> Result<Vec<TreeNode>, TreeError> {
        if entity == self.root {
            return Err(TreeError::RootRemoval);
        }
        let parent = self
            .nodes
            .get(&entity)
            .ok_or(TreeError::NodeNotFound(entity))?
            .parent;
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != entity);
        }

        let mut order = Vec::new();
        self.traverse(entity, |node, _| order.push(node.entity));

        let mut removed = Vec::with_capacity(order.len());
        for e in order.into_iter().rev() {
            if let Some(node) = self.nodes.remove(&e) {
                self.uuid_index.remove(&node.uuid);
                removed.push(node);
            }
        }
        Ok(removed)
    }

    /// Move `entity` under `new_parent`, appended after existing children.
    pub fn reparent(&mut self, entity: Entity, new_parent: Entity) -> Result<(), TreeError> {
        if entity == self.root {
            return Err(TreeError::RootRemoval);
        }
        if !self.nodes.contains_key(&entity) {
            return Err(TreeError::NodeNotFound(entity));
        }
        if !self.nodes.contains_key(&new_parent) {
            return Err(TreeError::ParentNotFound(new_parent.to_string()));
        }
        let mut cursor = Some(new_parent);
        while let Some(current) = cursor {
            if current == entity {
                return Err(TreeError::Cycle {
                    entity,
                    parent: new_parent,
                });
            }
            cursor = self.parent_of(current);
        }

        if let Some(old) = self.parent_of(entity).and_then(|p| self.nodes.get_mut(&p)) {
            old.children.retain(|c| *c != entity);
        }
        if let Some(parent) = self.nodes.get_mut(&new_parent) {
            parent.children.push(entity);
        }
        if let Some(node) = self.nodes.get_mut(&entity) {
            node.parent = Some(new_parent);
        }
        Ok(())
    }

    /// Pre-order depth-first walk from `start`; the callback gets the depth
    /// relative to `start`.
    pub fn traverse(&self, start: Entity, mut visit: impl FnMut(&TreeNode, usize)) {
        let mut stack = vec![(start, 0usize)];
        while let Some((entity, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(&entity) else {
                continue;
            };
            visit(node, depth);
            for child in node.children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
    }

    /// Every node reachable from the root, pre-order, with depth.
    pub fn depth_first(&self) -> Vec<(Entity, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.traverse(self.root, |node, depth| out.push((node.entity, depth)));
        out
    }
}
