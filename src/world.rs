//! Simulation world container and snapshot types.
//!
//! The `Snapshot` struct provides a serializable view of the simulation
//! state for the host to render. Grounded on the teacher's `world.rs`
//! `Snapshot::from_world` query-and-flatten idiom; the squad/terrain/
//! destructible fields are replaced entirely by the new per-agent record the
//! spec's Agent model requires (§3, §6).

use crate::components::*;
use crate::faction::Faction;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a single agent's state for serialization (§6 "Agent record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: u32,
    pub kind: u32,
    pub faction: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub facing: String,
    pub health: f32,
    pub health_max: f32,
    pub state: String,
}

fn faction_str(faction: &Faction) -> &'static str {
    match faction {
        Faction::Player => "Player",
        Faction::Red => "Red",
        Faction::Blue => "Blue",
        Faction::Green => "Green",
        Faction::Purple => "Purple",
    }
}

fn facing_str(facing: &Facing) -> &'static str {
    match facing {
        Facing::Front => "Front",
        Facing::Back => "Back",
        Facing::Left => "Left",
        Facing::Right => "Right",
    }
}

fn state_str(state: &AgentState) -> &'static str {
    match state {
        AgentState::Idle => "Idle",
        AgentState::Walking => "Walking",
        AgentState::Attacking => "Attacking",
        AgentState::Hurt => "Hurt",
        AgentState::Dead => "Dead",
    }
}

/// Complete simulation state snapshot for the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub time: f32,
    pub agents: Vec<AgentSnapshot>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world. Inactive (pooled) agents are
    /// excluded — they are not part of the active simulation (§4.9).
    pub fn from_world(world: &mut World, tick: u64, time: f32) -> Self {
        let mut agents = Vec::new();

        let mut query = world.query_filtered::<(
            Entity,
            &AgentKind,
            &Faction,
            &Position,
            &Velocity,
            &Facing,
            &Health,
            &AgentState,
        ), Without<Inactive>>();

        for (entity, kind, faction, pos, vel, facing, health, state) in query.iter(world) {
            agents.push(AgentSnapshot {
                id: entity.index(),
                kind: kind.0,
                faction: faction_str(faction).to_string(),
                x: pos.0.x,
                y: pos.0.y,
                vx: vel.0.x,
                vy: vel.0.y,
                facing: facing_str(facing).to_string(),
                health: health.current,
                health_max: health.max,
                state: state_str(state).to_string(),
            });
        }

        Self { tick, time, agents }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
