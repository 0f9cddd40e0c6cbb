//! FactionTable — static ally/enemy/neutral relations between named factions.
//!
//! Grounded on the teacher's `Faction` component (`components.rs`), expanded
//! from the teacher's two-faction Blue/Red split to the five canonical
//! factions the spec requires, plus the relation table the teacher never had
//! (the teacher hard-codes "everyone not mine is hostile").

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The five canonical factions.
#[derive(Component, Resource, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Player,
    Red,
    Blue,
    Green,
    Purple,
}

impl Faction {
    pub const ALL: [Faction; 5] = [
        Faction::Player,
        Faction::Red,
        Faction::Blue,
        Faction::Green,
        Faction::Purple,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    Ally,
    Enemy,
    Neutral,
}

/// Per-faction relation set plus the physics collision-group mask used by
/// hosts that want to cull ORCA/collision checks between factions that can
/// never meaningfully collide (e.g. a projectile pool vs its own owner).
#[derive(Debug, Clone, Default)]
pub struct FactionRelations {
    pub allies: Vec<Faction>,
    pub enemies: Vec<Faction>,
    pub neutrals: Vec<Faction>,
    pub physics_group_mask: u32,
}

/// Mapping from faction to its relations. Invariant: `relation(A, B) ==
/// relation(B, A)` for symmetric kinds (Ally/Enemy/Neutral are all symmetric
/// in this model — there is no one-sided hostility).
#[derive(Resource, Debug, Clone)]
pub struct FactionTable {
    relations: HashMap<Faction, FactionRelations>,
}

impl FactionTable {
    /// Build a table from an explicit list of `(a, b, relation)` edges.
    /// Edges are inserted symmetrically; any unmentioned pair defaults to
    /// `Neutral`.
    pub fn from_edges(edges: &[(Faction, Faction, Relation)]) -> Self {
        let mut relations: HashMap<Faction, FactionRelations> = Faction::ALL
            .iter()
            .map(|f| (*f, FactionRelations::default()))
            .collect();

        for &(a, b, rel) in edges {
            Self::insert_symmetric(&mut relations, a, b, rel);
        }

        Self { relations }
    }

    fn insert_symmetric(
        relations: &mut HashMap<Faction, FactionRelations>,
        a: Faction,
        b: Faction,
        rel: Relation,
    ) {
        for (x, y) in [(a, b), (b, a)] {
            let entry = relations.entry(x).or_default();
            match rel {
                Relation::Ally => entry.allies.push(y),
                Relation::Enemy => entry.enemies.push(y),
                Relation::Neutral => entry.neutrals.push(y),
            }
        }
    }

    /// Default game setup: Player allied with Blue, hostile to Red and
    /// Purple; Blue vs Red is the main war; Green is neutral to everyone.
    pub fn default_skirmish() -> Self {
        Self::from_edges(&[
            (Faction::Player, Faction::Blue, Relation::Ally),
            (Faction::Player, Faction::Red, Relation::Enemy),
            (Faction::Player, Faction::Purple, Relation::Enemy),
            (Faction::Blue, Faction::Red, Relation::Enemy),
            (Faction::Blue, Faction::Purple, Relation::Enemy),
            (Faction::Red, Faction::Purple, Relation::Enemy),
        ])
    }

    pub fn relation(&self, a: Faction, b: Faction) -> Relation {
        if a == b {
            return Relation::Ally;
        }
        if let Some(rels) = self.relations.get(&a) {
            if rels.enemies.contains(&b) {
                return Relation::Enemy;
            }
            if rels.allies.contains(&b) {
                return Relation::Ally;
            }
        }
        Relation::Neutral
    }

    pub fn are_hostile(&self, a: Faction, b: Faction) -> bool {
        self.relation(a, b) == Relation::Enemy
    }

    pub fn are_allied(&self, a: Faction, b: Faction) -> bool {
        self.relation(a, b) == Relation::Ally
    }

    pub fn physics_group_mask(&self, faction: Faction) -> u32 {
        self.relations
            .get(&faction)
            .map(|r| r.physics_group_mask)
            .unwrap_or(0)
    }
}

impl Default for FactionTable {
    fn default() -> Self {
        Self::default_skirmish()
    }
}
