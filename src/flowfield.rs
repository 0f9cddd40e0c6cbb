//! FlowField (§4.5): a coarse march direction per faction.
//!
//! Deliberately degenerate per the spec — `direction_for` ignores the
//! column/position argument entirely and just returns the faction's
//! configured march heading. Grounded on the teacher's `world.rs`
//! `Resource`-as-lookup-table idiom (e.g. `TerrainResource`), applied here
//! to a `HashMap<Faction, Direction>` instead of a grid.

use crate::faction::Faction;
use bevy_ecs::system::Resource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn sign(self) -> f32 {
        match self {
            Direction::Left => -1.0,
            Direction::Right => 1.0,
        }
    }
}

/// Per-faction march heading, set once from the opposing factions' relative
/// positions at level load and held fixed for the match (§4.5).
#[derive(Resource, Default)]
pub struct FlowField {
    headings: HashMap<Faction, Direction>,
}

impl FlowField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_direction(&mut self, faction: Faction, direction: Direction) {
        self.headings.insert(faction, direction);
    }

    /// Faction `a` marches toward the side `b` spawns from: if `a` spawned
    /// left of `b`, `a` heads right and `b` heads left.
    pub fn from_spawn_sides(a: Faction, a_spawn_x: f32, b: Faction, b_spawn_x: f32) -> Self {
        let mut field = Self::default();
        if a_spawn_x <= b_spawn_x {
            field.set_direction(a, Direction::Right);
            field.set_direction(b, Direction::Left);
        } else {
            field.set_direction(a, Direction::Left);
            field.set_direction(b, Direction::Right);
        }
        field
    }

    /// Ignores `_column` entirely — every agent of a faction gets the same
    /// heading regardless of where on the map it stands (§4.5 Non-goal:
    /// no terrain-aware routing).
    pub fn direction_for(&self, faction: Faction, _column: i32) -> Direction {
        self.headings.get(&faction).copied().unwrap_or(Direction::Right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_ignores_column_argument() {
        let mut field = FlowField::new();
        field.set_direction(Faction::Red, Direction::Left);
        assert_eq!(field.direction_for(Faction::Red, 0), Direction::Left);
        assert_eq!(field.direction_for(Faction::Red, 9999), Direction::Left);
    }

    #[test]
    fn from_spawn_sides_points_factions_at_each_other() {
        let field = FlowField::from_spawn_sides(Faction::Blue, -100.0, Faction::Red, 100.0);
        assert_eq!(field.direction_for(Faction::Blue, 0), Direction::Right);
        assert_eq!(field.direction_for(Faction::Red, 0), Direction::Left);
    }

    #[test]
    fn unconfigured_faction_defaults_to_right() {
        let field = FlowField::new();
        assert_eq!(field.direction_for(Faction::Green, 0), Direction::Right);
    }
}
