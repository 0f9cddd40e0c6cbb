//! TargetRegistry + TargetResolver (§4.2): memory-augmented hostile target
//! selection with LOS gating, threat/role/surround scoring, and 1v1 lock
//! arbitration.
//!
//! Grounded on the teacher's `ai.rs` `threat_awareness_system` for the
//! "gather nearby hostiles from the spatial grid, then pick one" shape;
//! everything downstream of that gather step (memory, LOS cache, scoring,
//! locks) is this crate's own addition since the teacher has no analogous
//! concept of a persistent 1v1 claim on a target.

pub mod los;
pub mod memory;
pub mod scoring;

pub use los::{has_line_of_sight, LosCache};
pub use memory::TargetMemory;
pub use scoring::{score_candidate, sector_counts, sector_of, AgentRole, CandidateSnapshot, LockState, ScoringConfig};

use crate::components::Inactive;
use crate::faction::Faction;
use crate::math::Vec2;
use bevy_ecs::entity::Entity;
use bevy_ecs::prelude::{Query, Res, ResMut, Without};
use bevy_ecs::system::Resource;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct TargetInfo {
    pub handle: Entity,
    pub position: Vec2,
    pub faction: Faction,
    pub score: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct TargetResolverConfig {
    pub memory_duration_ticks: u64,
    pub los_cache_timeout_ticks: u64,
    pub max_search_attempts: u32,
    /// LOS raycast bound (§9 "`maxLineOfSightDistance` vs `detection_range`":
    /// "LOS is the looser bound" — a brain gathers/raycasts out to
    /// `max(max_line_of_sight_distance, AgentStats::detection_range)`).
    pub max_line_of_sight_distance: f32,
    /// The other half of that same `max()` comparison, duplicated here so a
    /// resolver config carries both of the Open Question's named fields
    /// rather than requiring the caller to reach into `AgentStats`.
    pub combat_detection_range: f32,
    /// Whether agents allied with the viewer block LOS (§4.2 "allied/enemy
    /// units block only if configured").
    pub allies_block_los: bool,
    /// Whether agents hostile to the viewer block LOS.
    pub enemies_block_los: bool,
    pub scoring: ScoringConfig,
}

impl Default for TargetResolverConfig {
    fn default() -> Self {
        Self {
            memory_duration_ticks: 150,
            los_cache_timeout_ticks: 10,
            max_search_attempts: 3,
            max_line_of_sight_distance: 60.0,
            combat_detection_range: 50.0,
            allies_block_los: false,
            enemies_block_los: false,
            scoring: ScoringConfig {
                sector_crowding_threshold: 3,
                sector_crowding_penalty: 0.2,
                surround_bonus: 2.0,
                locked_pair_penalty: 0.2,
                combat_priority_penalty: 0.3,
                enable_surround: true,
                enable_one_vs_one: true,
            },
        }
    }
}

/// Bidirectional 1v1 claim map (§4.2 "at most one attacker locks a given
/// target"). Stale entries (dead handles on either side) are released
/// lazily on `lock()`/explicitly via `sweep()`.
#[derive(Resource, Default)]
pub struct TargetLocks {
    target_to_attacker: HashMap<Entity, Entity>,
    attacker_to_target: HashMap<Entity, Entity>,
}

impl TargetLocks {
    pub fn lock_state(&self, target: Entity, attacker: Entity) -> LockState {
        match self.target_to_attacker.get(&target) {
            None => LockState::Unlocked,
            Some(&owner) if owner == attacker => LockState::LockedPair,
            Some(_) => LockState::LockedByOther,
        }
    }

    pub fn locked_target_of(&self, attacker: Entity) -> Option<Entity> {
        self.attacker_to_target.get(&attacker).copied()
    }

    pub fn locked_attacker_of(&self, target: Entity) -> Option<Entity> {
        self.target_to_attacker.get(&target).copied()
    }

    /// Attempts to claim `target` for `attacker`. Fails only if `target` is
    /// already locked by a different, still-alive attacker. A stale lock
    /// (owner no longer alive per `alive`) is displaced.
    pub fn lock(&mut self, target: Entity, attacker: Entity, alive: &dyn Fn(Entity) -> bool) -> bool {
        if let Some(&owner) = self.target_to_attacker.get(&target) {
            if owner == attacker {
                return true;
            }
            if alive(owner) {
                return false;
            }
            self.attacker_to_target.remove(&owner);
        }
        if let Some(prev_target) = self.attacker_to_target.get(&attacker).copied() {
            if prev_target != target {
                self.target_to_attacker.remove(&prev_target);
            }
        }
        self.target_to_attacker.insert(target, attacker);
        self.attacker_to_target.insert(attacker, target);
        true
    }

    pub fn release_target(&mut self, target: Entity) {
        if let Some(attacker) = self.target_to_attacker.remove(&target) {
            self.attacker_to_target.remove(&attacker);
        }
    }

    pub fn release_attacker(&mut self, attacker: Entity) {
        if let Some(target) = self.attacker_to_target.remove(&attacker) {
            self.target_to_attacker.remove(&target);
        }
    }

    /// Releases every lock where either side fails `alive` — the
    /// background sweep named in §4.2's boundary case ("locked attacker
    /// dies mid-swing, target becomes lockable again on the next sweep").
    pub fn sweep(&mut self, alive: &dyn Fn(Entity) -> bool) {
        let stale: Vec<Entity> = self
            .target_to_attacker
            .iter()
            .filter(|(target, attacker)| !alive(**target) || !alive(**attacker))
            .map(|(target, _)| *target)
            .collect();
        for target in stale {
            self.release_target(target);
        }
    }
}

/// Per-tick working state: memory of previously-seen targets and the LOS
/// cache. Config lives separately in `TargetResolverConfig` since it's
/// static, not mutated by resolution.
#[derive(Resource, Default)]
pub struct TargetResolver {
    pub memory: TargetMemory,
    pub los_cache: LosCache,
}

impl TargetResolver {
    /// Runs the full scoring pipeline over `candidates` and returns the
    /// highest-scoring one without attempting a lock.
    pub fn find_best(
        &self,
        observer: Entity,
        observer_pos: Vec2,
        candidates: &[CandidateSnapshot],
        sector_counts_by_target: &HashMap<Entity, [u32; 8]>,
        locks: &TargetLocks,
        config: &TargetResolverConfig,
    ) -> Option<TargetInfo> {
        let locked_elsewhere = locks.locked_target_of(observer);
        candidates
            .iter()
            .map(|c| {
                let lock_state = locks.lock_state(c.handle, observer);
                let sector = sector_of(c.pos, observer_pos);
                let counts = sector_counts_by_target.get(&c.handle).copied().unwrap_or([0; 8]);
                let elsewhere = locked_elsewhere.is_some_and(|t| t != c.handle);
                let score = score_candidate(observer_pos, c, sector, &counts, lock_state, elsewhere, &config.scoring);
                (score, c)
            })
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(score, c)| TargetInfo {
                handle: c.handle,
                position: c.pos,
                faction: c.faction,
                score,
            })
    }

    /// Scores every candidate, then attempts to lock them in descending
    /// score order until one succeeds (§4.2: a contested top choice falls
    /// through to the next-best free target rather than returning nothing).
    pub fn find_and_lock(
        &self,
        observer: Entity,
        observer_pos: Vec2,
        candidates: &[CandidateSnapshot],
        sector_counts_by_target: &HashMap<Entity, [u32; 8]>,
        locks: &mut TargetLocks,
        alive: &dyn Fn(Entity) -> bool,
        config: &TargetResolverConfig,
    ) -> Option<TargetInfo> {
        let locked_elsewhere = locks.locked_target_of(observer);
        let mut scored: Vec<(f32, &CandidateSnapshot)> = candidates
            .iter()
            .map(|c| {
                let lock_state = locks.lock_state(c.handle, observer);
                let sector = sector_of(c.pos, observer_pos);
                let counts = sector_counts_by_target.get(&c.handle).copied().unwrap_or([0; 8]);
                let elsewhere = locked_elsewhere.is_some_and(|t| t != c.handle);
                let score = score_candidate(observer_pos, c, sector, &counts, lock_state, elsewhere, &config.scoring);
                (score, c)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        for (score, c) in scored {
            if locks.lock(c.handle, observer, alive) {
                return Some(TargetInfo {
                    handle: c.handle,
                    position: c.pos,
                    faction: c.faction,
                    score,
                });
            }
        }
        None
    }

    /// Background sweep (§4.2): evicts stale locks and expired memory/LOS
    /// cache entries. Run on its own interval, not every tick.
    pub fn sweep(&mut self, locks: &mut TargetLocks, tick: u64, config: &TargetResolverConfig, alive: &dyn Fn(Entity) -> bool) {
        locks.sweep(alive);
        self.memory.purge_expired(tick, config.memory_duration_ticks);
        self.los_cache.evict_expired(tick, config.los_cache_timeout_ticks);
    }
}

/// Gates `TargetResolver::sweep` to its own interval, independent of the
/// tick rate (§4.2: the background sweep runs "on its own interval, not
/// every tick").
#[derive(Resource, Debug, Clone, Copy)]
pub struct TargetSweepTimer {
    pub interval: f32,
    remaining: f32,
}

impl TargetSweepTimer {
    pub fn new(interval: f32) -> Self {
        Self { interval, remaining: 0.0 }
    }

    pub fn tick(&mut self, dt: f32) -> bool {
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.remaining += self.interval;
            true
        } else {
            false
        }
    }
}

impl Default for TargetSweepTimer {
    fn default() -> Self {
        Self::new(0.5)
    }
}

/// Tick Driver step 7: evicts stale locks and expired memory/LOS cache
/// entries. An entity counts as alive if it still exists and is not
/// `Inactive` (pooled).
pub fn target_sweep_system(
    dt: Res<crate::systems::movement::DeltaTime>,
    tick: Res<crate::systems::performance::SimTick>,
    mut timer: ResMut<TargetSweepTimer>,
    config: Res<TargetResolverConfig>,
    mut resolver: ResMut<TargetResolver>,
    mut locks: ResMut<TargetLocks>,
    alive_query: Query<(), Without<Inactive>>,
) {
    if !timer.tick(dt.0) {
        return;
    }
    let alive = |e: Entity| alive_query.contains(e);
    resolver.sweep(&mut locks, tick.0, &config, &alive);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(id: u32) -> Entity {
        Entity::from_raw(id)
    }

    fn candidate(id: u32, pos: Vec2) -> CandidateSnapshot {
        CandidateSnapshot {
            handle: e(id),
            pos,
            faction: Faction::Red,
            hp_fraction: 1.0,
            base_attack: 10.0,
            role: AgentRole::Regular,
            is_visible: true,
            engaged_with_ally: false,
        }
    }

    #[test]
    fn round_trip_lock_then_release_allows_new_lock() {
        let mut locks = TargetLocks::default();
        let alive = |_: Entity| true;
        assert!(locks.lock(e(10), e(1), &alive));
        assert!(!locks.lock(e(10), e(2), &alive));
        locks.release_target(e(10));
        assert!(locks.lock(e(10), e(2), &alive));
    }

    #[test]
    fn dead_attacker_lock_is_displaced_on_next_lock_attempt() {
        let mut locks = TargetLocks::default();
        locks.lock(e(10), e(1), &|_| true);
        assert!(locks.lock(e(10), e(2), &|h| h != e(1)));
        assert_eq!(locks.locked_attacker_of(e(10)), Some(e(2)));
    }

    #[test]
    fn sweep_releases_locks_with_dead_target_or_attacker() {
        let mut locks = TargetLocks::default();
        locks.lock(e(10), e(1), &|_| true);
        locks.sweep(&|h| h != e(10));
        assert_eq!(locks.locked_attacker_of(e(10)), None);
        assert_eq!(locks.locked_target_of(e(1)), None);
    }

    #[test]
    fn find_best_prefers_wounded_over_healthy() {
        let resolver = TargetResolver::default();
        let locks = TargetLocks::default();
        let config = TargetResolverConfig::default();
        let mut healthy = candidate(1, Vec2::new(10.0, 0.0));
        healthy.hp_fraction = 1.0;
        let mut wounded = candidate(2, Vec2::new(10.0, 0.0));
        wounded.hp_fraction = 0.1;
        let candidates = [healthy, wounded];
        let counts = HashMap::new();
        let best = resolver
            .find_best(e(100), Vec2::ZERO, &candidates, &counts, &locks, &config)
            .unwrap();
        assert_eq!(best.handle, e(2));
    }

    #[test]
    fn find_and_lock_falls_through_to_next_best_when_top_choice_contested() {
        let resolver = TargetResolver::default();
        let mut locks = TargetLocks::default();
        let config = TargetResolverConfig::default();

        let mut strong = candidate(1, Vec2::new(10.0, 0.0));
        strong.hp_fraction = 0.1;
        let weak = candidate(2, Vec2::new(10.0, 0.0));
        let candidates = [strong, weak];
        let counts = HashMap::new();
        let alive = |_: Entity| true;

        // Another attacker already owns the strong (wounded) candidate.
        locks.lock(e(1), e(999), &alive);

        let result = resolver
            .find_and_lock(e(100), Vec2::ZERO, &candidates, &counts, &mut locks, &alive, &config)
            .unwrap();
        assert_eq!(result.handle, e(2));
    }

    #[test]
    fn locked_attacker_dying_mid_swing_frees_target_after_sweep() {
        let mut resolver = TargetResolver::default();
        let mut locks = TargetLocks::default();
        let config = TargetResolverConfig::default();
        let alive = |h: Entity| h != e(1);

        locks.lock(e(10), e(1), &|_| true);
        resolver.sweep(&mut locks, 0, &config, &alive);
        assert_eq!(locks.locked_attacker_of(e(10)), None);

        let candidates = [candidate(10, Vec2::new(5.0, 0.0))];
        let counts = HashMap::new();
        let locked = resolver.find_and_lock(e(2), Vec2::ZERO, &candidates, &counts, &mut locks, &alive, &config);
        assert!(locked.is_some());
    }

    #[test]
    fn sweep_system_releases_locks_held_by_despawned_entities() {
        use bevy_ecs::prelude::{Schedule, World};

        let mut world = World::new();
        world.insert_resource(crate::systems::movement::DeltaTime(1.0));
        world.insert_resource(crate::systems::performance::SimTick(0));
        world.insert_resource(TargetSweepTimer::new(0.0));
        world.insert_resource(TargetResolverConfig::default());
        world.insert_resource(TargetResolver::default());
        world.insert_resource(TargetLocks::default());

        let attacker = world.spawn_empty().id();
        let target = Entity::from_raw(9999); // never spawned: stands in for a despawned entity
        world.resource_mut::<TargetLocks>().lock(target, attacker, &|_| true);

        let mut schedule = Schedule::default();
        schedule.add_systems(target_sweep_system);
        schedule.run(&mut world);

        assert_eq!(world.resource::<TargetLocks>().locked_attacker_of(target), None);
    }
}
