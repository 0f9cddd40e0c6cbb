//! Nx3 — N columns × 3 fixed rows (§4.1).

use super::{AliveLookup, EntityType, Hit, QueryOptions, SpatialEntry, SpatialIndex};
use crate::faction::Faction;
use crate::math::Vec2;
use bevy_ecs::entity::Entity;
use std::collections::HashMap;

const RAY_HIT_RADIUS: f32 = 12.0;

pub struct Nx3 {
    cols: i32,
    world_w: f32,
    world_h: f32,
    cells: HashMap<(i32, i32), Vec<SpatialEntry>>,
    entity_cells: HashMap<Entity, (i32, i32)>,
    pending: Vec<(Entity, Vec2)>,
    alive: Option<AliveLookup>,
}

impl Nx3 {
    pub fn new(cols: i32, world_w: f32, world_h: f32) -> Self {
        Self {
            cols,
            world_w,
            world_h,
            cells: HashMap::new(),
            entity_cells: HashMap::new(),
            pending: Vec::new(),
            alive: None,
        }
    }

    fn col_width(&self) -> f32 {
        self.world_w / self.cols.max(1) as f32
    }

    fn world_to_cell(&self, pos: Vec2) -> (i32, i32) {
        let col = (pos.x / self.col_width()).floor() as i32;
        let col = col.clamp(0, (self.cols - 1).max(0));
        let row_height = self.world_h / 3.0;
        let row = ((pos.y + self.world_h / 2.0) / row_height).floor() as i32;
        let row = row.clamp(0, 2);
        (col, row)
    }
}

impl SpatialIndex for Nx3 {
    fn register(&mut self, handle: Entity, faction: Faction, entity_type: EntityType, pos: Vec2) {
        if let Some(&old) = self.entity_cells.get(&handle) {
            if let Some(entries) = self.cells.get_mut(&old) {
                entries.retain(|e| e.handle != handle);
            }
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
            if let Some(entries) = self.cells.get_mut(&cell) {
                entries.retain(|e| e.handle != handle);
            }
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
            let Some(&old_cell) = self.entity_cells.get(&handle) else {
                continue;
            };
            let new_cell = {
                let col = (new_pos.x / (self.world_w / self.cols.max(1) as f32)).floor() as i32;
                let col = col.clamp(0, (self.cols - 1).max(0));
                let row_height = self.world_h / 3.0;
                let row = ((new_pos.y + self.world_h / 2.0) / row_height).floor() as i32;
                (col, row.clamp(0, 2))
            };
            if new_cell == old_cell {
                if let Some(entries) = self.cells.get_mut(&old_cell) {
                    if let Some(e) = entries.iter_mut().find(|e| e.handle == handle) {
                        e.pos = new_pos;
                    }
                }
                continue;
            }
            let meta = self
                .cells
                .get(&old_cell)
                .and_then(|entries| entries.iter().find(|e| e.handle == handle))
                .map(|e| (e.faction, e.entity_type));
            if let Some((faction, entity_type)) = meta {
                if let Some(entries) = self.cells.get_mut(&old_cell) {
                    entries.retain(|e| e.handle != handle);
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
        let col_radius = (radius / self.col_width()).ceil() as i32;
        let effective_radius = opts.max_distance.map(|m| m.min(radius)).unwrap_or(radius);
        let mut hits = Vec::new();
        for dx in -col_radius..=col_radius {
            for row in 0..3 {
                let Some(entries) = self.cells.get(&(center.0 + dx, row)) else {
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
        let step = (self.col_width() * 0.25).min(max_dist.max(1.0) / 8.0).max(1.0);
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

    #[test]
    fn row_assignment_matches_vertical_band() {
        let grid = Nx3::new(10, 1000.0, 300.0);
        assert_eq!(grid.world_to_cell(Vec2::new(0.0, -150.0)).1, 0);
        assert_eq!(grid.world_to_cell(Vec2::new(0.0, 0.0)).1, 1);
        assert_eq!(grid.world_to_cell(Vec2::new(0.0, 149.0)).1, 2);
    }

    #[test]
    fn register_then_unregister_empties_grid() {
        let mut grid = Nx3::new(10, 1000.0, 300.0);
        let e = Entity::from_raw(1);
        grid.register(e, Faction::Red, EntityType::Agent, Vec2::new(5.0, 5.0));
        grid.unregister(e);
        assert_eq!(grid.total_count(), 0);
    }

    #[test]
    fn query_radius_spans_multiple_rows() {
        let mut grid = Nx3::new(10, 1000.0, 300.0);
        let top = Entity::from_raw(1);
        let bottom = Entity::from_raw(2);
        grid.register(top, Faction::Red, EntityType::Agent, Vec2::new(0.0, -140.0));
        grid.register(bottom, Faction::Red, EntityType::Agent, Vec2::new(0.0, 140.0));
        let hits = grid.query_radius(Vec2::new(0.0, 0.0), 500.0, &QueryOptions::default());
        assert_eq!(hits.len(), 2);
    }
}
