//! Classical A* over a static walkability grid (§4.3).
//!
//! Grounded on
//! `examples/other_examples/9d61d0d7_osquera-mapf__solvers-mapf-astar-src-astar.rs.rs`:
//! its `BinaryHeap`-based open set (reversed `Ord` for a min-heap),
//! `came_from`/`g_score` `HashMap`s, and bounds/passability checks are the
//! structural template (`astar_single`); its centralized multi-agent MAPF
//! solvers are not used here since this pathfinder is a single-agent async
//! service, not a joint planner. The octile heuristic, 8-neighborhood
//! option, and waypoint smoothing below are not in that reference — they
//! are this crate's own addition per §4.3.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

pub struct WalkGrid {
    pub width: i32,
    pub height: i32,
    walkable: Vec<bool>,
}

impl WalkGrid {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            walkable: vec![true; (width * height).max(0) as usize],
        }
    }

    pub fn in_bounds(&self, c: Coord) -> bool {
        c.x >= 0 && c.y >= 0 && c.x < self.width && c.y < self.height
    }

    fn index(&self, c: Coord) -> usize {
        (c.y * self.width + c.x) as usize
    }

    pub fn is_walkable(&self, c: Coord) -> bool {
        self.in_bounds(c) && self.walkable[self.index(c)]
    }

    pub fn set_walkable(&mut self, c: Coord, walkable: bool) {
        if self.in_bounds(c) {
            let idx = self.index(c);
            self.walkable[idx] = walkable;
        }
    }
}

/// Octile distance heuristic: `14*min(dx,dy) + 10*|dx-dy|` (§4.3), scaled so
/// straight steps cost 10 and diagonal steps cost 14 — matches the
/// integer-ish tie-break convention named in the spec.
pub fn octile_heuristic(a: Coord, b: Coord) -> i32 {
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    14 * dx.min(dy) + 10 * (dx - dy).abs()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Node {
    coord: Coord,
    f_cost: i32,
    h_cost: i32,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) pops the lowest f first;
        // ties prefer lower h (§4.3 "Tie-break prefers lower h").
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| other.h_cost.cmp(&self.h_cost))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn neighbors(c: Coord, allow_diagonal: bool) -> Vec<(Coord, i32)> {
    let mut result = vec![
        (Coord::new(c.x + 1, c.y), 10),
        (Coord::new(c.x - 1, c.y), 10),
        (Coord::new(c.x, c.y + 1), 10),
        (Coord::new(c.x, c.y - 1), 10),
    ];
    if allow_diagonal {
        result.extend([
            (Coord::new(c.x + 1, c.y + 1), 14),
            (Coord::new(c.x + 1, c.y - 1), 14),
            (Coord::new(c.x - 1, c.y + 1), 14),
            (Coord::new(c.x - 1, c.y - 1), 14),
        ]);
    }
    result
}

/// Classical A* with 4- or 8-neighborhood. Returns the waypoint sequence
/// (inclusive of start and end) or `None` if unreachable, off-grid, or
/// non-walkable at either endpoint (§4.3 "Failure").
pub fn find_path(grid: &WalkGrid, start: Coord, end: Coord, allow_diagonal: bool) -> Option<Vec<Coord>> {
    if !grid.is_walkable(start) || !grid.is_walkable(end) {
        return None;
    }
    if start == end {
        return Some(vec![start]);
    }

    let mut open = BinaryHeap::new();
    let mut came_from: HashMap<Coord, Coord> = HashMap::new();
    let mut g_score: HashMap<Coord, i32> = HashMap::new();

    g_score.insert(start, 0);
    open.push(Node {
        coord: start,
        f_cost: octile_heuristic(start, end),
        h_cost: octile_heuristic(start, end),
    });

    while let Some(current) = open.pop() {
        if current.coord == end {
            return Some(reconstruct(&came_from, current.coord));
        }
        let current_g = *g_score.get(&current.coord).unwrap_or(&i32::MAX);

        for (next, step_cost) in neighbors(current.coord, allow_diagonal) {
            if !grid.is_walkable(next) {
                continue;
            }
            let tentative_g = current_g + step_cost;
            if tentative_g < *g_score.get(&next).unwrap_or(&i32::MAX) {
                came_from.insert(next, current.coord);
                g_score.insert(next, tentative_g);
                let h = octile_heuristic(next, end);
                open.push(Node {
                    coord: next,
                    f_cost: tentative_g + h,
                    h_cost: h,
                });
            }
        }
    }

    None
}

fn reconstruct(came_from: &HashMap<Coord, Coord>, mut current: Coord) -> Vec<Coord> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_on_open_grid() {
        let grid = WalkGrid::new(10, 10);
        let path = find_path(&grid, Coord::new(0, 0), Coord::new(5, 0), false).unwrap();
        assert_eq!(path.first(), Some(&Coord::new(0, 0)));
        assert_eq!(path.last(), Some(&Coord::new(5, 0)));
    }

    #[test]
    fn unreachable_behind_full_wall_returns_none() {
        let mut grid = WalkGrid::new(5, 5);
        for y in 0..5 {
            grid.set_walkable(Coord::new(2, y), false);
        }
        assert!(find_path(&grid, Coord::new(0, 0), Coord::new(4, 4), true).is_none());
    }

    #[test]
    fn non_walkable_endpoint_returns_none() {
        let mut grid = WalkGrid::new(5, 5);
        grid.set_walkable(Coord::new(4, 4), false);
        assert!(find_path(&grid, Coord::new(0, 0), Coord::new(4, 4), true).is_none());
    }

    #[test]
    fn octile_heuristic_matches_formula() {
        assert_eq!(octile_heuristic(Coord::new(0, 0), Coord::new(3, 1)), 14 * 1 + 10 * 2);
    }
}
