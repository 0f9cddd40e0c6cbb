//! Per-observer target memory (§4.2 "memory-augmented target selection"):
//! an agent that loses line of sight keeps chasing the last known position
//! for `memory_duration_ticks` before giving up.
//!
//! New data structure — the teacher has no analogous "remember where I last
//! saw you" state; `ai.rs` re-evaluates purely from the current spatial
//! query every tick. Storage shape (nested `HashMap` keyed by the owning
//! entity) follows the same idiom as `TargetLocks` below it.

use crate::math::Vec2;
use bevy_ecs::entity::Entity;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct MemoryEntry {
    pub last_seen_pos: Vec2,
    pub last_seen_tick: u64,
    pub search_attempts: u32,
}

#[derive(Default)]
pub struct TargetMemory {
    entries: HashMap<Entity, HashMap<Entity, MemoryEntry>>,
}

impl TargetMemory {
    /// Refreshes (or creates) the memory of `target` as seen by `observer`,
    /// resetting its search-attempt counter.
    pub fn observe(&mut self, observer: Entity, target: Entity, pos: Vec2, tick: u64) {
        self.entries.entry(observer).or_default().insert(
            target,
            MemoryEntry {
                last_seen_pos: pos,
                last_seen_tick: tick,
                search_attempts: 0,
            },
        );
    }

    pub fn get(&self, observer: Entity, target: Entity) -> Option<&MemoryEntry> {
        self.entries.get(&observer)?.get(&target)
    }

    pub fn is_fresh(&self, observer: Entity, target: Entity, tick: u64, duration_ticks: u64) -> bool {
        self.get(observer, target)
            .map(|entry| tick.saturating_sub(entry.last_seen_tick) <= duration_ticks)
            .unwrap_or(false)
    }

    /// Increments and returns the search-attempt count for a target an
    /// observer is pursuing from memory but can no longer see.
    pub fn record_search_attempt(&mut self, observer: Entity, target: Entity) -> u32 {
        if let Some(entry) = self.entries.get_mut(&observer).and_then(|m| m.get_mut(&target)) {
            entry.search_attempts += 1;
            entry.search_attempts
        } else {
            0
        }
    }

    pub fn forget(&mut self, observer: Entity, target: Entity) {
        if let Some(map) = self.entries.get_mut(&observer) {
            map.remove(&target);
        }
    }

    /// Drops all memory owned by an observer, e.g. on death/pool return.
    pub fn forget_observer(&mut self, observer: Entity) {
        self.entries.remove(&observer);
    }

    /// Drops all memories pointing at a target, e.g. on the target's death.
    pub fn forget_target_everywhere(&mut self, target: Entity) {
        for map in self.entries.values_mut() {
            map.remove(&target);
        }
    }

    /// Background sweep: drops entries older than `duration_ticks`.
    pub fn purge_expired(&mut self, tick: u64, duration_ticks: u64) {
        for map in self.entries.values_mut() {
            map.retain(|_, entry| tick.saturating_sub(entry.last_seen_tick) <= duration_ticks);
        }
        self.entries.retain(|_, map| !map.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(id: u32) -> Entity {
        Entity::from_raw(id)
    }

    #[test]
    fn fresh_memory_within_duration() {
        let mut mem = TargetMemory::default();
        mem.observe(e(1), e(2), Vec2::new(3.0, 4.0), 10);
        assert!(mem.is_fresh(e(1), e(2), 15, 20));
        assert!(!mem.is_fresh(e(1), e(2), 40, 20));
    }

    #[test]
    fn search_attempts_increment_and_reset_on_reobserve() {
        let mut mem = TargetMemory::default();
        mem.observe(e(1), e(2), Vec2::ZERO, 0);
        assert_eq!(mem.record_search_attempt(e(1), e(2)), 1);
        assert_eq!(mem.record_search_attempt(e(1), e(2)), 2);
        mem.observe(e(1), e(2), Vec2::ZERO, 5);
        assert_eq!(mem.get(e(1), e(2)).unwrap().search_attempts, 0);
    }

    #[test]
    fn purge_expired_removes_only_stale_entries() {
        let mut mem = TargetMemory::default();
        mem.observe(e(1), e(2), Vec2::ZERO, 0);
        mem.observe(e(1), e(3), Vec2::ZERO, 90);
        mem.purge_expired(100, 20);
        assert!(mem.get(e(1), e(2)).is_none());
        assert!(mem.get(e(1), e(3)).is_some());
    }

    #[test]
    fn forget_observer_clears_all_its_memories() {
        let mut mem = TargetMemory::default();
        mem.observe(e(1), e(2), Vec2::ZERO, 0);
        mem.observe(e(1), e(3), Vec2::ZERO, 0);
        mem.forget_observer(e(1));
        assert!(mem.get(e(1), e(2)).is_none());
        assert!(mem.get(e(1), e(3)).is_none());
    }
}
