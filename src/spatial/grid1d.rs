//! Grid1D — a single row of N columns (§4.1).
//!
//! Used by the "MarchingState ↔ EncounterState" 1D-band scenario (§4.6,
//! §8 S6): agents live on one axis, and `query_three_columns` is the
//! detection primitive the brain uses to scan {col-1, col, col+1}.

use super::{AliveLookup, EntityType, Hit, QueryOptions, SpatialEntry, SpatialIndex};
use crate::faction::Faction;
use crate::math::Vec2;
use bevy_ecs::entity::Entity;
use std::collections::HashMap;

const RAY_HIT_RADIUS: f32 = 12.0;

pub struct Grid1D {
    cols: i32,
    world_w: f32,
    cells: HashMap<i32, Vec<SpatialEntry>>,
    entity_cells: HashMap<Entity, i32>,
    pending: Vec<(Entity, Vec2)>,
    alive: Option<AliveLookup>,
}

impl Grid1D {
    pub fn new(cols: i32, world_w: f32) -> Self {
        Self {
            cols,
            world_w,
            cells: HashMap::new(),
            entity_cells: HashMap::new(),
            pending: Vec::new(),
            alive: None,
        }
    }

    fn col_width(&self) -> f32 {
        self.world_w / self.cols.max(1) as f32
    }

    fn world_to_col(&self, pos: Vec2) -> i32 {
        ((pos.x / self.col_width()).floor() as i32).clamp(0, (self.cols - 1).max(0))
    }

    fn collect(&self, col: i32, pos: Vec2, opts: &QueryOptions) -> Vec<Hit> {
        let Some(entries) = self.cells.get(&col) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter(|e| opts.matches(e, &self.alive))
            .map(|e| Hit {
                handle: e.handle,
                faction: e.faction,
                pos: e.pos,
                // Re-distanced by true Euclidean world distance, not grid
                // distance, per §4.1.
                distance: pos.distance_to(e.pos),
            })
            .collect()
    }
}

impl SpatialIndex for Grid1D {
    fn register(&mut self, handle: Entity, faction: Faction, entity_type: EntityType, pos: Vec2) {
        if let Some(&old) = self.entity_cells.get(&handle) {
            if let Some(entries) = self.cells.get_mut(&old) {
                entries.retain(|e| e.handle != handle);
            }
        }
        let col = self.world_to_col(pos);
        self.cells.entry(col).or_default().push(SpatialEntry {
            handle,
            faction,
            entity_type,
            pos,
        });
        self.entity_cells.insert(handle, col);
    }

    fn unregister(&mut self, handle: Entity) {
        if let Some(col) = self.entity_cells.remove(&handle) {
            if let Some(entries) = self.cells.get_mut(&col) {
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
            let Some(&old_col) = self.entity_cells.get(&handle) else {
                continue;
            };
            let new_col = self.world_to_col(new_pos);
            if new_col == old_col {
                if let Some(entries) = self.cells.get_mut(&old_col) {
                    if let Some(e) = entries.iter_mut().find(|e| e.handle == handle) {
                        e.pos = new_pos;
                    }
                }
                continue;
            }
            let meta = self
                .cells
                .get(&old_col)
                .and_then(|entries| entries.iter().find(|e| e.handle == handle))
                .map(|e| (e.faction, e.entity_type));
            if let Some((faction, entity_type)) = meta {
                if let Some(entries) = self.cells.get_mut(&old_col) {
                    entries.retain(|e| e.handle != handle);
                }
                self.cells.entry(new_col).or_default().push(SpatialEntry {
                    handle,
                    faction,
                    entity_type,
                    pos: new_pos,
                });
                self.entity_cells.insert(handle, new_col);
            }
        }
    }

    fn query_nearest(&self, pos: Vec2, opts: &QueryOptions) -> Option<Hit> {
        self.query_radius(pos, f32::MAX, opts)
            .into_iter()
            .min_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap())
    }

    fn query_radius(&self, pos: Vec2, radius: f32, opts: &QueryOptions) -> Vec<Hit> {
        let center = self.world_to_col(pos);
        let col_radius = (radius / self.col_width()).ceil() as i32;
        let effective_radius = opts.max_distance.map(|m| m.min(radius)).unwrap_or(radius);
        let mut hits: Vec<Hit> = (-col_radius..=col_radius)
            .flat_map(|dx| self.collect(center + dx, pos, opts))
            .filter(|h| h.distance <= effective_radius)
            .collect();
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
        hits
    }

    fn query_three_columns(&self, col: i32, opts: &QueryOptions) -> Vec<Hit> {
        let mut hits: Vec<Hit> = (-1..=1)
            .flat_map(|dx| {
                let c = col + dx;
                let origin = Vec2::new((c as f32 + 0.5) * self.col_width(), 0.0);
                self.collect(c, origin, opts)
            })
            .collect();
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
        let col = self.world_to_col(cell_of_pos);
        let mut counts = HashMap::new();
        if let Some(entries) = self.cells.get(&col) {
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

    // S6 setup: 30-column 1D grid, Red in col 7, Blue in col 8 — the brain's
    // three-column scan from col 7 must see the Blue agent.
    #[test]
    fn scenario_s6_three_column_scan_detects_neighbor() {
        let mut grid = Grid1D::new(30, 3000.0);
        let red = Entity::from_raw(1);
        let blue = Entity::from_raw(2);
        let col_width = 3000.0 / 30.0;
        grid.register(red, Faction::Red, EntityType::Agent, Vec2::new(7.5 * col_width, 0.0));
        grid.register(blue, Faction::Blue, EntityType::Agent, Vec2::new(8.5 * col_width, 0.0));

        let mut opts = QueryOptions::default();
        opts.factions = Some(vec![Faction::Blue]);
        let hits = grid.query_three_columns(7, &opts);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].handle, blue);
    }

    #[test]
    fn three_columns_redistances_by_euclidean_not_grid() {
        let mut grid = Grid1D::new(30, 3000.0);
        let e = Entity::from_raw(1);
        let col_width = 3000.0 / 30.0;
        grid.register(e, Faction::Red, EntityType::Agent, Vec2::new(8.5 * col_width, 40.0));
        let hits = grid.query_three_columns(7, &QueryOptions::default());
        assert_eq!(hits.len(), 1);
        // distance must reflect the y-offset too, not just the column gap.
        assert!(hits[0].distance > col_width);
    }
}
