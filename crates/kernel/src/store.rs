use metaspace_common::Entity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An event record produced by every entity allocation or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityEvent {
    Created(Entity),
    Released(Entity),
}

/// Allocates opaque entity handles.
///
/// The store knows nothing beyond identity: all entity state lives in
/// component storage. Live entities are kept in a BTreeSet so iteration is
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    live: BTreeSet<Entity>,
    next: u64,
    tick: u64,
    events: Vec<EntityEvent>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh entity.
    pub fn create(&mut self) -> Entity {
        let entity = Entity(self.next);
        self.next += 1;
        self.live.insert(entity);
        self.events.push(EntityEvent::Created(entity));
        entity
    }

    /// Release an entity. Returns false if it was not alive.
    pub fn release(&mut self, entity: Entity) -> bool {
        if self.live.remove(&entity) {
            self.events.push(EntityEvent::Released(entity));
            true
        } else {
            tracing::debug!(%entity, "release of an entity that is not alive");
            false
        }
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.live.contains(&entity)
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.live.iter().copied()
    }

    /// Current engine tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advance the engine tick counter by one.
    pub fn step(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Drain and return the allocation log.
    pub fn drain_events(&mut self) -> Vec<EntityEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[EntityEvent] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_starts_empty() {
        let s = EntityStore::new();
        assert!(s.is_empty());
        assert_eq!(s.tick(), 0);
    }

    #[test]
    fn create_and_release() {
        let mut s = EntityStore::new();
        let e = s.create();
        assert!(s.is_alive(e));
        assert_eq!(s.len(), 1);

        assert!(s.release(e));
        assert!(!s.is_alive(e));
        assert!(!s.release(e));
        assert_eq!(s.events().len(), 2);
    }

    #[test]
    fn handles_are_not_reused() {
        let mut s = EntityStore::new();
        let a = s.create();
        s.release(a);
        let b = s.create();
        assert_ne!(a, b);
    }

    #[test]
    fn iteration_is_ordered() {
        let mut s = EntityStore::new();
        let ids: Vec<Entity> = (0..20).map(|_| s.create()).collect();
        let iterated: Vec<Entity> = s.iter().collect();
        assert_eq!(iterated, ids);
    }

    #[test]
    fn step_increments_tick() {
        let mut s = EntityStore::new();
        s.step();
        s.step();
        assert_eq!(s.step(), 3);
        assert_eq!(s.tick(), 3);
    }

    #[test]
    fn drain_events_clears_log() {
        let mut s = EntityStore::new();
        s.create();
        assert_eq!(s.drain_events().len(), 1);
        assert!(s.events().is_empty());
    }
}
