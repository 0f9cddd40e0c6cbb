//! Pathfinder — async A* requests over a static walkability grid, with a
//! path cache and waypoint smoothing (§4.3).

pub mod astar;

use crate::math::Vec2;
use astar::{find_path, Coord, WalkGrid};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Path {
    pub waypoints: Vec<Vec2>,
    pub total_distance: f32,
    pub smoothed: bool,
    pub cached_at_tick: u64,
}

impl Path {
    fn from_waypoints(waypoints: Vec<Vec2>, smoothed: bool, tick: u64) -> Self {
        let total_distance = waypoints
            .windows(2)
            .map(|w| w[0].distance_to(w[1]))
            .sum();
        Self {
            waypoints,
            total_distance,
            smoothed,
            cached_at_tick: tick,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PathfinderConfig {
    pub cell_size: f32,
    pub map_w: i32,
    pub map_h: i32,
    pub allow_diagonal: bool,
    pub path_cache_time_ticks: u64,
    pub max_calc_time_per_frame_ms: f32,
    pub enable_smoothing: bool,
    pub request_ttl_ticks: u64,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            cell_size: 20.0,
            map_w: 64,
            map_h: 64,
            allow_diagonal: true,
            path_cache_time_ticks: 300, // ~10s at 30Hz
            max_calc_time_per_frame_ms: 5.0,
            enable_smoothing: true,
            request_ttl_ticks: 300, // 10s
        }
    }
}

struct PendingRequest {
    id: u64,
    start: Vec2,
    end: Vec2,
    priority: i32,
    submitted_tick: u64,
    callback: Box<dyn FnOnce(Option<Path>) + Send + Sync>,
}

impl PartialEq for PendingRequest {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.submitted_tick == other.submitted_tick
    }
}
impl Eq for PendingRequest {}
impl Ord for PendingRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first; among equal priority, older requests first.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.submitted_tick.cmp(&self.submitted_tick))
    }
}
impl PartialOrd for PendingRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn round_key(pos: Vec2, cell_size: f32) -> (i32, i32) {
    (
        (pos.x / cell_size).round() as i32,
        (pos.y / cell_size).round() as i32,
    )
}

#[derive(Resource)]
pub struct Pathfinder {
    config: PathfinderConfig,
    grid: WalkGrid,
    cache: HashMap<((i32, i32), (i32, i32)), Path>,
    queue: BinaryHeap<PendingRequest>,
    next_id: u64,
}

impl Pathfinder {
    pub fn new(config: PathfinderConfig) -> Self {
        Self {
            grid: WalkGrid::new(config.map_w, config.map_h),
            config,
            cache: HashMap::new(),
            queue: BinaryHeap::new(),
            next_id: 0,
        }
    }

    fn to_cell(&self, pos: Vec2) -> Coord {
        Coord::new(
            (pos.x / self.config.cell_size).floor() as i32,
            (pos.y / self.config.cell_size).floor() as i32,
        )
    }

    fn to_world(&self, c: Coord) -> Vec2 {
        Vec2::new(
            (c.x as f32 + 0.5) * self.config.cell_size,
            (c.y as f32 + 0.5) * self.config.cell_size,
        )
    }

    /// Seeds walkability by sampling 5 points per cell against an
    /// obstacle predicate (§4.3 "seeded by sampling 5 points inside each
    /// cell against static obstacles at init").
    pub fn seed_walkability(&mut self, is_obstacle: impl Fn(Vec2) -> bool) {
        let cs = self.config.cell_size;
        for y in 0..self.config.map_h {
            for x in 0..self.config.map_w {
                let c = Coord::new(x, y);
                let center = self.to_world(c);
                let samples = [
                    center,
                    center + Vec2::new(cs * 0.3, 0.0),
                    center + Vec2::new(-cs * 0.3, 0.0),
                    center + Vec2::new(0.0, cs * 0.3),
                    center + Vec2::new(0.0, -cs * 0.3),
                ];
                let blocked = samples.iter().any(|&s| is_obstacle(s));
                self.grid.set_walkable(c, !blocked);
            }
        }
    }

    pub fn mark_walkable(&mut self, pos: Vec2, walkable: bool) {
        let cell = self.to_cell(pos);
        self.grid.set_walkable(cell, walkable);
        // Invalidate cached paths whose waypoints lie within a radius of
        // the change (§4.3).
        let radius = self.config.cell_size * 2.0;
        self.cache
            .retain(|_, path| !path.waypoints.iter().any(|w| w.distance_to(pos) <= radius));
    }

    pub fn find_sync(&mut self, start: Vec2, end: Vec2, tick: u64) -> Option<Path> {
        let key = (round_key(start, self.config.cell_size), round_key(end, self.config.cell_size));
        if let Some(cached) = self.cache.get(&key) {
            if tick.saturating_sub(cached.cached_at_tick) <= self.config.path_cache_time_ticks {
                return Some(cached.clone());
            }
        }

        let start_cell = self.to_cell(start);
        let end_cell = self.to_cell(end);
        let raw = find_path(&self.grid, start_cell, end_cell, self.config.allow_diagonal)?;
        let waypoints: Vec<Vec2> = raw.iter().map(|&c| self.to_world(c)).collect();

        let (final_waypoints, smoothed) = if self.config.enable_smoothing {
            (self.smooth(&waypoints), true)
        } else {
            (waypoints, false)
        };

        let path = Path::from_waypoints(final_waypoints, smoothed, tick);
        self.cache.insert(key, path.clone());
        Some(path)
    }

    /// Greedy LOS-based waypoint culling: keep extending the current
    /// segment forward while the straight line between the anchor and the
    /// candidate waypoint is step-sampled walkable; drop everything in
    /// between (§4.3 "Smoothing").
    fn smooth(&self, waypoints: &[Vec2]) -> Vec<Vec2> {
        if waypoints.len() <= 2 {
            return waypoints.to_vec();
        }
        let mut result = vec![waypoints[0]];
        let mut anchor = 0;
        let mut probe = 2;
        while probe < waypoints.len() {
            if self.has_los(waypoints[anchor], waypoints[probe]) {
                probe += 1;
            } else {
                result.push(waypoints[probe - 1]);
                anchor = probe - 1;
                probe += 1;
            }
        }
        result.push(*waypoints.last().unwrap());
        result
    }

    fn has_los(&self, a: Vec2, b: Vec2) -> bool {
        let dist = a.distance_to(b);
        if dist < f32::EPSILON {
            return true;
        }
        let dir = (b - a) / dist;
        let step = self.config.cell_size * 0.5;
        let mut traveled = 0.0;
        while traveled <= dist {
            let sample = a + dir * traveled;
            if !self.grid.is_walkable(self.to_cell(sample)) {
                return false;
            }
            traveled += step;
        }
        true
    }

    /// Enqueues an async request; the tick driver pops from this queue up
    /// to `max_calc_time_per_frame_ms` each tick via `process_requests`.
    pub fn request(
        &mut self,
        start: Vec2,
        end: Vec2,
        priority: i32,
        tick: u64,
        callback: impl FnOnce(Option<Path>) + Send + Sync + 'static,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(PendingRequest {
            id,
            start,
            end,
            priority,
            submitted_tick: tick,
            callback: Box::new(callback),
        });
        id
    }

    /// Pops and solves queued requests up to the configured per-frame time
    /// budget; requests older than `request_ttl_ticks` are dropped with a
    /// null result (§4.3 "Async scheduler").
    pub fn process_requests(&mut self, tick: u64) {
        let budget = std::time::Duration::from_secs_f32(self.config.max_calc_time_per_frame_ms / 1000.0);
        let started = std::time::Instant::now();
        while started.elapsed() < budget {
            let Some(req) = self.queue.pop() else {
                break;
            };
            if tick.saturating_sub(req.submitted_tick) > self.config.request_ttl_ticks {
                (req.callback)(None);
                continue;
            }
            let result = self.find_sync(req.start, req.end, tick);
            (req.callback)(result);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // S4: 20x20 grid with a vertical wall x=10 from y=2..18. find_sync((0,10),
    // (19,10)) returns a path with >= 2 waypoints; distance > 19*cell_size;
    // smoothed path has fewer waypoints than unsmoothed.
    #[test]
    fn scenario_s4_routes_around_wall_and_smooths() {
        let cell_size = 10.0;
        let config = PathfinderConfig {
            cell_size,
            map_w: 20,
            map_h: 20,
            allow_diagonal: true,
            enable_smoothing: false,
            ..PathfinderConfig::default()
        };
        let mut pf = Pathfinder::new(config);
        pf.seed_walkability(|pos| {
            let cell_x = (pos.x / cell_size).floor() as i32;
            let cell_y = (pos.y / cell_size).floor() as i32;
            cell_x == 10 && (2..=18).contains(&cell_y)
        });

        let start = Vec2::new(0.5 * cell_size, 10.5 * cell_size);
        let end = Vec2::new(19.5 * cell_size, 10.5 * cell_size);

        let unsmoothed = pf.find_sync(start, end, 0).expect("path should exist");
        assert!(unsmoothed.waypoints.len() >= 2);
        assert!(unsmoothed.total_distance > 19.0 * cell_size);

        let mut pf_smoothed = Pathfinder::new(PathfinderConfig {
            cell_size,
            map_w: 20,
            map_h: 20,
            allow_diagonal: true,
            enable_smoothing: true,
            ..PathfinderConfig::default()
        });
        pf_smoothed.seed_walkability(|pos| {
            let cell_x = (pos.x / cell_size).floor() as i32;
            let cell_y = (pos.y / cell_size).floor() as i32;
            cell_x == 10 && (2..=18).contains(&cell_y)
        });
        let smoothed = pf_smoothed.find_sync(start, end, 0).expect("path should exist");
        assert!(smoothed.waypoints.len() <= unsmoothed.waypoints.len());
    }

    #[test]
    fn cache_hit_returns_equal_waypoints() {
        let mut pf = Pathfinder::new(PathfinderConfig {
            map_w: 10,
            map_h: 10,
            ..PathfinderConfig::default()
        });
        let start = Vec2::new(5.0, 5.0);
        let end = Vec2::new(150.0, 5.0);
        let first = pf.find_sync(start, end, 0).unwrap();
        let second = pf.find_sync(start, end, 1).unwrap();
        assert_eq!(first.waypoints.len(), second.waypoints.len());
    }

    #[test]
    fn mark_walkable_roundtrip_restores_path() {
        let mut pf = Pathfinder::new(PathfinderConfig {
            cell_size: 10.0,
            map_w: 10,
            map_h: 10,
            enable_smoothing: false,
            ..PathfinderConfig::default()
        });
        let blocked = Vec2::new(55.0, 5.0);
        pf.mark_walkable(blocked, false);
        assert!(pf.find_sync(Vec2::new(5.0, 5.0), Vec2::new(95.0, 5.0), 0).is_some());
        pf.mark_walkable(blocked, true);
        let path = pf.find_sync(Vec2::new(5.0, 5.0), Vec2::new(95.0, 5.0), 1000);
        assert!(path.is_some());
    }

    #[test]
    fn unreachable_target_returns_none() {
        let mut pf = Pathfinder::new(PathfinderConfig {
            cell_size: 10.0,
            map_w: 5,
            map_h: 5,
            ..PathfinderConfig::default()
        });
        for y in 0..5 {
            pf.grid.set_walkable(Coord::new(2, y), false);
        }
        assert!(pf.find_sync(Vec2::new(5.0, 5.0), Vec2::new(45.0, 45.0), 0).is_none());
    }

    #[test]
    fn stale_request_is_dropped_with_none() {
        let mut pf = Pathfinder::new(PathfinderConfig {
            request_ttl_ticks: 5,
            ..PathfinderConfig::default()
        });
        let called = std::sync::Arc::new(std::sync::Mutex::new(None));
        let called2 = called.clone();
        pf.request(Vec2::ZERO, Vec2::new(10.0, 0.0), 0, 0, move |result| {
            *called2.lock().unwrap() = Some(result);
        });
        pf.process_requests(1000);
        let outcome = called.lock().unwrap();
        assert!(matches!(*outcome, Some(None)));
    }
}
