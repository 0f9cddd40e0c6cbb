//! Object pool (§4.9): reuse agent entities instead of despawning them.
//!
//! New module, grounded on the `Inactive`-marker + free-list convention
//! established in `components.rs` (`AgentBundle`/`Inactive`). The teacher
//! never reuses entities — destroyed units are despawned outright — so the
//! free-list bookkeeping below is this crate's own addition; the
//! per-kind `HashMap<AgentKind, Vec<Entity>>` storage shape follows the same
//! idiom as `target::TargetMemory`'s nested maps.

use crate::components::{AgentKind, Inactive};
use bevy_ecs::system::Resource;
use bevy_ecs::world::World;
use std::collections::HashMap;

use bevy_ecs::entity::Entity;

#[derive(Resource, Default)]
pub struct Pool {
    free_by_kind: HashMap<AgentKind, Vec<Entity>>,
    prewarm_counts: HashMap<AgentKind, usize>,
    total_acquired: u64,
    total_released: u64,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_prewarm_count(&mut self, kind: AgentKind, count: usize) {
        self.prewarm_counts.insert(kind, count);
    }

    /// Spawns up to the configured prewarm count for `kind`, tagging each
    /// with `Inactive` and pushing it onto the free list. `spawn_fn` builds
    /// the entity's full bundle (caller supplies stats/position — prewarmed
    /// agents still need a valid `AgentBundle`, just inactive).
    pub fn prewarm(&mut self, world: &mut World, kind: AgentKind, spawn_fn: impl Fn(&mut World) -> Entity) {
        let target = self.prewarm_counts.get(&kind).copied().unwrap_or(0);
        let have = self.free_by_kind.get(&kind).map(|l| l.len()).unwrap_or(0);
        for _ in have..target {
            let handle = spawn_fn(world);
            world.entity_mut(handle).insert(Inactive);
            self.free_by_kind.entry(kind).or_default().push(handle);
        }
    }

    /// Takes a free handle from the pool, if one exists, without touching
    /// the `World` — the caller (state machine / brain) is responsible for
    /// removing `Inactive` and resetting its stats (`on_reuse`).
    pub fn try_acquire(&mut self, kind: AgentKind) -> Option<Entity> {
        let handle = self.free_by_kind.get_mut(&kind).and_then(|list| list.pop());
        if handle.is_some() {
            self.total_acquired += 1;
        }
        handle
    }

    /// Returns `handle` to the free list for `kind`. Caller must have
    /// already re-inserted `Inactive` and zeroed transient state.
    pub fn release(&mut self, kind: AgentKind, handle: Entity) {
        self.free_by_kind.entry(kind).or_default().push(handle);
        self.total_released += 1;
    }

    pub fn free_count(&self, kind: AgentKind) -> usize {
        self.free_by_kind.get(&kind).map(|l| l.len()).unwrap_or(0)
    }

    pub fn total_acquired(&self) -> u64 {
        self.total_acquired
    }

    pub fn total_released(&self) -> u64 {
        self.total_released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_then_acquire_returns_same_handle() {
        let mut pool = Pool::new();
        let handle = Entity::from_raw(7);
        pool.release(AgentKind(1), handle);
        assert_eq!(pool.free_count(AgentKind(1)), 1);
        assert_eq!(pool.try_acquire(AgentKind(1)), Some(handle));
        assert_eq!(pool.free_count(AgentKind(1)), 0);
    }

    #[test]
    fn acquire_from_empty_pool_returns_none() {
        let mut pool = Pool::new();
        assert_eq!(pool.try_acquire(AgentKind(3)), None);
    }

    #[test]
    fn kinds_do_not_share_free_lists() {
        let mut pool = Pool::new();
        pool.release(AgentKind(1), Entity::from_raw(1));
        assert_eq!(pool.try_acquire(AgentKind(2)), None);
        assert_eq!(pool.free_count(AgentKind(1)), 1);
    }

    #[test]
    fn prewarm_spawns_up_to_the_configured_count() {
        let mut world = World::new();
        let mut pool = Pool::new();
        pool.set_prewarm_count(AgentKind(1), 3);
        pool.prewarm(&mut world, AgentKind(1), |w| w.spawn_empty().id());
        assert_eq!(pool.free_count(AgentKind(1)), 3);

        // Calling prewarm again does not over-spawn past the target count.
        pool.prewarm(&mut world, AgentKind(1), |w| w.spawn_empty().id());
        assert_eq!(pool.free_count(AgentKind(1)), 3);
    }
}
