//! Line-of-sight raycasting and its tick-TTL cache (§4.2's LOS bonus,
//! §4.1's `predict_collision`).
//!
//! Grounded on the teacher's `spatial.rs` nearest-entry query shape, reused
//! here as a raycast against `EntityType::Obstacle` occluders through the
//! now-generic `SpatialIndex::predict_collision` contract.

use crate::faction::{Faction, FactionTable};
use crate::math::Vec2;
use crate::spatial::{EntityType, QueryOptions, SpatialIndex};
use std::collections::HashMap;

/// Rounds to the nearest quarter-unit so nearly-identical ray endpoints
/// share a cache entry without needing bit-exact repeats.
fn round_key(v: Vec2) -> (i32, i32) {
    ((v.x * 4.0).round() as i32, (v.y * 4.0).round() as i32)
}

#[derive(Default)]
pub struct LosCache {
    entries: HashMap<((i32, i32), (i32, i32)), (bool, u64)>,
}

impl LosCache {
    pub fn get(&self, a: Vec2, b: Vec2, tick: u64, ttl_ticks: u64) -> Option<bool> {
        let key = (round_key(a), round_key(b));
        self.entries
            .get(&key)
            .filter(|(_, cached_tick)| tick.saturating_sub(*cached_tick) <= ttl_ticks)
            .map(|(visible, _)| *visible)
    }

    pub fn insert(&mut self, a: Vec2, b: Vec2, tick: u64, visible: bool) {
        let key = (round_key(a), round_key(b));
        self.entries.insert(key, (visible, tick));
    }

    /// Drops every entry older than `ttl_ticks`, called from the resolver
    /// sweep so the map doesn't grow unbounded over a long run.
    pub fn evict_expired(&mut self, tick: u64, ttl_ticks: u64) {
        self.entries
            .retain(|_, (_, cached_tick)| tick.saturating_sub(*cached_tick) <= ttl_ticks);
    }
}

/// Casts a ray from `from` to `to`. Static obstacles always block (§4.2
/// "static obstacles always block"); agents block only per
/// `allies_block_los`/`enemies_block_los`, evaluated relative to
/// `viewer_faction` (§4.2 "allied/enemy units block only if configured").
pub fn has_line_of_sight(
    grid: &dyn SpatialIndex,
    from: Vec2,
    to: Vec2,
    viewer_faction: Faction,
    factions: &FactionTable,
    allies_block_los: bool,
    enemies_block_los: bool,
) -> bool {
    let delta = to - from;
    let dist = delta.length();
    if dist < f32::EPSILON {
        return true;
    }
    let dir = delta / dist;

    let obstacle_opts = QueryOptions {
        entity_types: Some(vec![EntityType::Obstacle]),
        ..Default::default()
    };
    if let Some(hit) = grid.predict_collision(from, dir, dist, &obstacle_opts) {
        if hit.distance < dist - 1e-2 {
            return false;
        }
    }

    if allies_block_los || enemies_block_los {
        let blocking_factions: Vec<Faction> = Faction::ALL
            .iter()
            .copied()
            .filter(|&f| {
                (allies_block_los && factions.are_allied(viewer_faction, f))
                    || (enemies_block_los && factions.are_hostile(viewer_faction, f))
            })
            .collect();
        let agent_opts = QueryOptions {
            entity_types: Some(vec![EntityType::Agent]),
            factions: Some(blocking_factions),
            ..Default::default()
        };
        if let Some(hit) = grid.predict_collision(from, dir, dist, &agent_opts) {
            if hit.distance < dist - 1e-2 {
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_round_trips_within_ttl() {
        let mut cache = LosCache::default();
        cache.insert(Vec2::ZERO, Vec2::new(10.0, 0.0), 5, true);
        assert_eq!(cache.get(Vec2::ZERO, Vec2::new(10.0, 0.0), 8, 10), Some(true));
    }

    #[test]
    fn cache_expires_past_ttl() {
        let mut cache = LosCache::default();
        cache.insert(Vec2::ZERO, Vec2::new(10.0, 0.0), 5, true);
        assert_eq!(cache.get(Vec2::ZERO, Vec2::new(10.0, 0.0), 50, 10), None);
    }

    #[test]
    fn evict_expired_drops_stale_entries_only() {
        let mut cache = LosCache::default();
        cache.insert(Vec2::ZERO, Vec2::new(1.0, 0.0), 0, true);
        cache.insert(Vec2::ZERO, Vec2::new(2.0, 0.0), 40, true);
        cache.evict_expired(50, 10);
        assert_eq!(cache.entries.len(), 1);
    }
}
