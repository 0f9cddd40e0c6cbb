//! Bucket2D — world tiled into square cells of size `S` (§4.1).

use super::{AliveLookup, EntityType, Hit, QueryOptions, SpatialEntry, SpatialIndex};
use crate::faction::Faction;
use crate::math::Vec2;
use bevy_ecs::entity::Entity;
use std::collections::HashMap;

/// Radius (world units) a ray-cast collision check considers a hit. Matches
/// the typical agent collider size used across the scenario tests (§8 S5).
const RAY_HIT_RADIUS: f32 = 12.0;

pub struct Bucket2D {
    cell_size: f32,
    cells: HashMap<(i32, i32), Vec<SpatialEntry>>,
    entity_cells: HashMap<Entity, (i32, i32)>,
    pending: Vec<(Entity, Vec2)>,
    alive: Option<AliveLookup>,
}

impl Bucket2D {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            entity_cells: HashMap::new(),
            pending: Vec::new(),
            alive: None,
        }
    }

    pub fn with_alive_lookup(cell_size: f32, alive: AliveLookup) -> Self {
        Self {
            alive: Some(alive),
            ..Self::new(cell_size)
        }
    }

    fn world_to_cell(&self, pos: Vec2) -> (i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
        )
    }

    fn cell_radius(&self, r: f32) -> i32 {
        (r / self.cell_size).ceil() as i32
    }

    fn remove_from_cell(&mut self, handle: Entity, cell: (i32, i32)) {
        if let Some(entries) = self.cells.get_mut(&cell) {
            entries.retain(|e| e.handle != handle);
            if entries.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }
}

impl SpatialIndex for Bucket2D {
    fn register(&mut self, handle: Entity, faction: Faction, entity_type: EntityType, pos: Vec2) {
        if let Some(&old_cell) = self.entity_cells.get(&handle) {
            // Registering the same handle twice is a no-op update (§4.1).
            self.remove_from_cell(handle, old_cell);
        }
        let cell = self.world_to_cell(pos);
        self.cells.entry(cell).or_default().push(SpatialEntry {
            handle,
            faction,
            entity_type,
            pos,
        });
        self.entity_cells.insert(handle, cell);
    }

    fn unregister(&mut self, handle: Entity) {
        if let Some(cell) = self.entity_cells.remove(&handle) {
            self.remove_from_cell(handle, cell);
        }
        self.pending.retain(|(h, _)| *h != handle);
    }

    fn move_to(&mut self, handle: Entity, new_pos: Vec2) {
        if self.entity_cells.contains_key(&handle) {
            self.pending.push((handle, new_pos));
        }
    }

    fn flush(&mut self) {
        for (handle, new_pos) in self.pending.drain(..) {
            // Entity may have been unregistered after the move was queued;
            // flushing after the world has freed an entity must not panic.
            let Some(&old_cell) = self.entity_cells.get(&handle) else {
                continue;
            };
            let new_cell = (
                (new_pos.x / self.cell_size).floor() as i32,
                (new_pos.y / self.cell_size).floor() as i32,
            );
            if new_cell == old_cell {
                if let Some(entries) = self.cells.get_mut(&old_cell) {
                    if let Some(e) = entries.iter_mut().find(|e| e.handle == handle) {
                        e.pos = new_pos;
                    }
                }
                continue;
            }
            let faction_type = self
                .cells
                .get(&old_cell)
                .and_then(|entries| entries.iter().find(|e| e.handle == handle))
                .map(|e| (e.faction, e.entity_type));
            if let Some((faction, entity_type)) = faction_type {
                if let Some(entries) = self.cells.get_mut(&old_cell) {
                    entries.retain(|e| e.handle != handle);
                    if entries.is_empty() {
                        self.cells.remove(&old_cell);
                    }
                }
                self.cells.entry(new_cell).or_default().push(SpatialEntry {
                    handle,
                    faction,
                    entity_type,
                    pos: new_pos,
                });
                self.entity_cells.insert(handle, new_cell);
            }
        }
    }

    fn query_nearest(&self, pos: Vec2, opts: &QueryOptions) -> Option<Hit> {
        self.query_radius(pos, f32::MAX, opts)
            .into_iter()
            .min_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap())
    }

    fn query_radius(&self, pos: Vec2, radius: f32, opts: &QueryOptions) -> Vec<Hit> {
        let center = self.world_to_cell(pos);
        let cr = self.cell_radius(radius.min(1.0e9));
        let effective_radius = opts.max_distance.map(|m| m.min(radius)).unwrap_or(radius);
        let mut hits = Vec::new();
        for dx in -cr..=cr {
            for dy in -cr..=cr {
                let Some(entries) = self.cells.get(&(center.0 + dx, center.1 + dy)) else {
                    continue;
                };
                for entry in entries {
                    if !opts.matches(entry, &self.alive) {
                        continue;
                    }
                    let distance = pos.distance_to(entry.pos);
                    if distance <= effective_radius {
                        hits.push(Hit {
                            handle: entry.handle,
                            faction: entry.faction,
                            pos: entry.pos,
                            distance,
                        });
                    }
                }
            }
        }
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
        hits
    }

    fn predict_collision(
        &self,
        origin: Vec2,
        dir: Vec2,
        max_dist: f32,
        opts: &QueryOptions,
    ) -> Option<Hit> {
        let dir = dir.normalized();
        if dir.length_sq() < f32::EPSILON || max_dist <= 0.0 {
            return None;
        }
        let step = (self.cell_size * 0.25).min(max_dist.max(1.0) / 8.0).max(1.0);
        let mut traveled = 0.0;
        let mut best: Option<Hit> = None;
        while traveled <= max_dist {
            let sample = origin + dir * traveled;
            for hit in self.query_radius(sample, RAY_HIT_RADIUS, opts) {
                let along = (hit.pos - origin).dot(dir);
                if along < 0.0 || along > max_dist {
                    continue;
                }
                if best.map(|b| along < (b.pos - origin).dot(dir)).unwrap_or(true) {
                    best = Some(hit);
                }
            }
            if best.is_some() {
                break;
            }
            traveled += step;
        }
        best
    }

    fn faction_counts(&self, cell_of_pos: Vec2) -> HashMap<Faction, u32> {
        let cell = self.world_to_cell(cell_of_pos);
        let mut counts = HashMap::new();
        if let Some(entries) = self.cells.get(&cell) {
            for e in entries {
                *counts.entry(e.faction).or_insert(0) += 1;
            }
        }
        counts
    }

    fn total_count(&self) -> usize {
        self.entity_cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::always_alive;

    fn opts() -> QueryOptions {
        QueryOptions::default()
    }

    #[test]
    fn register_then_unregister_leaves_grid_empty() {
        let mut grid = Bucket2D::new(50.0);
        let e = Entity::from_raw(1);
        grid.register(e, Faction::Red, EntityType::Agent, Vec2::new(10.0, 10.0));
        assert_eq!(grid.total_count(), 1);
        grid.unregister(e);
        assert_eq!(grid.total_count(), 0);
        assert!(grid.query_radius(Vec2::new(10.0, 10.0), 100.0, &opts()).is_empty());
    }

    // S2: Bucket2D(cell=50). Register H1 at (10,10) and H2 at (60,10).
    // query_radius((10,10), 40) returns {H1 only}; query_radius((10,10), 60)
    // returns {H1, H2}.
    #[test]
    fn scenario_s2_query_radius() {
        let mut grid = Bucket2D::new(50.0);
        let h1 = Entity::from_raw(1);
        let h2 = Entity::from_raw(2);
        grid.register(h1, Faction::Red, EntityType::Agent, Vec2::new(10.0, 10.0));
        grid.register(h2, Faction::Red, EntityType::Agent, Vec2::new(60.0, 10.0));

        let near = grid.query_radius(Vec2::new(10.0, 10.0), 40.0, &opts());
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].handle, h1);

        let far = grid.query_radius(Vec2::new(10.0, 10.0), 60.0, &opts());
        assert_eq!(far.len(), 2);
    }

    #[test]
    fn flush_relocates_cell_after_large_move() {
        let mut grid = Bucket2D::new(10.0);
        let e = Entity::from_raw(1);
        grid.register(e, Faction::Blue, EntityType::Agent, Vec2::new(0.0, 0.0));
        grid.move_to(e, Vec2::new(500.0, 0.0));
        // Before flush, nothing has moved in the index yet.
        assert!(grid.query_radius(Vec2::new(500.0, 0.0), 5.0, &opts()).is_empty());
        grid.flush();
        let hits = grid.query_radius(Vec2::new(500.0, 0.0), 5.0, &opts());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].handle, e);
    }

    #[test]
    fn flush_skips_stale_handles_without_panicking() {
        let mut grid = Bucket2D::new(10.0);
        let e = Entity::from_raw(1);
        grid.register(e, Faction::Blue, EntityType::Agent, Vec2::ZERO);
        grid.move_to(e, Vec2::new(1.0, 1.0));
        grid.unregister(e);
        grid.flush();
    }

    #[test]
    fn double_register_is_a_no_op_update() {
        let mut grid = Bucket2D::new(10.0);
        let e = Entity::from_raw(1);
        grid.register(e, Faction::Blue, EntityType::Agent, Vec2::new(0.0, 0.0));
        grid.register(e, Faction::Blue, EntityType::Agent, Vec2::new(5.0, 5.0));
        assert_eq!(grid.total_count(), 1);
    }

    #[test]
    fn only_alive_filters_via_lookup() {
        let alive: std::sync::Arc<dyn Fn(Entity) -> bool + Send + Sync> =
            std::sync::Arc::new(|e: Entity| e.index() != 2);
        let mut grid = Bucket2D::with_alive_lookup(50.0, alive);
        let h1 = Entity::from_raw(1);
        let h2 = Entity::from_raw(2);
        grid.register(h1, Faction::Red, EntityType::Agent, Vec2::ZERO);
        grid.register(h2, Faction::Red, EntityType::Agent, Vec2::new(1.0, 0.0));
        let mut opts = QueryOptions::default();
        opts.only_alive = true;
        let hits = grid.query_radius(Vec2::ZERO, 100.0, &opts);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].handle, h1);
    }

    #[test]
    fn unregistering_unknown_handle_is_a_no_op() {
        let mut grid = Bucket2D::new(10.0);
        grid.unregister(Entity::from_raw(99));
        assert_eq!(grid.total_count(), 0);
    }

    #[test]
    fn predict_collision_finds_target_ahead() {
        let mut grid = Bucket2D::new(50.0);
        let target = Entity::from_raw(1);
        grid.register(target, Faction::Blue, EntityType::Agent, Vec2::new(100.0, 0.0));
        let mut opts = QueryOptions::default();
        opts.factions = Some(vec![Faction::Blue]);
        let hit = grid.predict_collision(Vec2::ZERO, Vec2::new(1.0, 0.0), 200.0, &opts);
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().handle, target);
        let _ = always_alive();
    }
}
