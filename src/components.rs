//! Per-agent components.
//!
//! Grounded on the teacher's `components.rs`: `Position`/`Velocity` keep the
//! teacher's flat-field style (now backed by `Vec2`, see `math.rs`), `Health`
//! keeps the teacher's damage/heal/fraction helpers, and bundle types follow
//! the teacher's `SquadBundle` construction idiom. The faction/order/state
//! enums are new — the teacher's `Faction` (Blue/Red only), `Order`, and
//! `BehaviorState` model a squad-tactics game, not this spec's five-faction,
//! discrete-intent, five-state combat core.

use crate::faction::Faction;
use crate::math::Vec2;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position(pub Vec2);

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self(Vec2::new(x, y))
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        self.0.distance_to(other.0)
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity(pub Vec2);

impl Velocity {
    pub fn new(x: f32, y: f32) -> Self {
        Self(Vec2::new(x, y))
    }

    pub fn magnitude(&self) -> f32 {
        self.0.length()
    }
}

/// Four-way facing derived from the movement vector for animation selection.
/// Preserved from the source per §9: `|dx| > |dy|` picks Left/Right,
/// otherwise Front/Back.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Facing {
    Front,
    Back,
    Left,
    Right,
}

impl Facing {
    pub fn from_movement(v: Vec2) -> Option<Facing> {
        if v.length_sq() < f32::EPSILON {
            return None;
        }
        Some(if v.x.abs() > v.y.abs() {
            if v.x > 0.0 {
                Facing::Right
            } else {
                Facing::Left
            }
        } else if v.y > 0.0 {
            Facing::Back
        } else {
            Facing::Front
        })
    }
}

impl Default for Facing {
    fn default() -> Self {
        Facing::Front
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn damage(&mut self, amount: f32) {
        self.current = (self.current - amount).max(0.0);
    }

    pub fn heal(&mut self, amount: f32) {
        self.current = (self.current + amount).min(self.max);
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            self.current / self.max
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }
}

/// Behavior tag distinguishing melee from ranged agents, per §9's
/// data-driven redesign (one agent record with a tag, rather than
/// subclassing).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Behavior {
    Melee,
    Ranged,
}

/// Per-kind combat/movement stats, set at spawn from the agent config table
/// (§6 "Agent config (input)").
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentStats {
    pub config_id: u32,
    pub radius: f32,
    pub max_speed: f32,
    pub base_attack: f32,
    pub attack_range: f32,
    pub detection_range: f32,
    pub attack_interval: f32,
    pub pursuit_range: f32,
    /// Seconds the Attacking animation plays before the state machine allows
    /// a transition out (§4.7 "animation finished").
    pub attack_anim_duration: f32,
    /// Seconds the Hurt animation plays before the state machine allows a
    /// transition out.
    pub hurt_anim_duration: f32,
    /// Animation frame at which `perform_damage` fires, at `animation_speed`
    /// fps (§4.7, default frame 5).
    pub attack_damage_frame: u32,
    pub animation_speed: f32,
    /// Delay before a dead agent is returned to the pool (§4.9).
    pub auto_recycle_delay: f32,
}

impl Default for AgentStats {
    fn default() -> Self {
        Self {
            config_id: 0,
            radius: 5.0,
            max_speed: 3.0,
            base_attack: 10.0,
            attack_range: 10.0,
            detection_range: 50.0,
            attack_interval: 1.0,
            pursuit_range: 60.0,
            attack_anim_duration: 0.5,
            hurt_anim_duration: 0.3,
            attack_damage_frame: 5,
            animation_speed: 12.0,
            auto_recycle_delay: 2.0,
        }
    }
}

/// `last_attack_time` in absolute seconds, compared against
/// `attack_interval` to gate re-entering Attacking (§4.7).
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LastAttackTime(pub f32);

/// Miscellaneous per-agent flags (§3 Agent record).
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AgentFlags {
    pub alive: bool,
    pub from_pool: bool,
    pub focus_locked: bool,
    pub ranged: bool,
}

/// Marker: this agent is AI-controlled (consults `AgentBrain`) rather than
/// driven by host-provided manual intents.
#[derive(Component, Debug, Clone, Copy)]
pub struct AIControlled;

/// Five-state finite state machine. Only the state machine system mutates
/// this (§3, §4.7) — every other system reads it.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Idle,
    Walking,
    Attacking,
    Hurt,
    Dead,
}

impl Default for AgentState {
    fn default() -> Self {
        AgentState::Idle
    }
}

/// Per-state progress counters the state machine needs to evaluate its
/// guards (animation-finished, hurt-anim-finished, cooldown) without a
/// wall-clock timer.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StateTimer {
    pub elapsed: f32,
}

/// Declared desire, published by AI or host input, consumed by the state
/// machine. Reset at the end of every tick (persistent intents are
/// re-published by their source) — see `IntentExpiry`.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Intent {
    None,
    AttackTarget(Entity),
    ChaseTarget(Entity),
    MoveTo(Vec2),
    March(Vec2),
    Idle,
}

impl Default for Intent {
    fn default() -> Self {
        Intent::None
    }
}

/// Tick at which the current `Intent` becomes stale and must be treated as
/// `Intent::None` by consumers (§4.6 "validity window").
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct IntentExpiry(pub u64);

/// Marching/Encounter sub-state for the 1D flow-field variant (§4.6).
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub enum MarchState {
    Marching,
    Encounter { since_tick: u64 },
}

impl Default for MarchState {
    fn default() -> Self {
        MarchState::Marching
    }
}

/// Per-agent interval gate for `AgentBrain::decide` (§4.6 `decide_interval`).
#[derive(Component, Debug, Clone, Copy)]
pub struct DecideTimer {
    pub interval: f32,
    pub remaining: f32,
}

impl DecideTimer {
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            remaining: 0.0,
        }
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

/// ORCA per-agent tuning, read by the solver. Grounded on the teacher's
/// per-component-stat style rather than a single global config, so
/// per-agent-type overrides (e.g. a projectile's tighter `time_horizon`)
/// are possible without a branch in the solver.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrcaAgent {
    pub pref_velocity: Vec2,
    pub new_velocity: Vec2,
    pub time_horizon: f32,
    pub neighbor_dist: f32,
}

impl Default for OrcaAgent {
    fn default() -> Self {
        Self {
            pref_velocity: Vec2::ZERO,
            new_velocity: Vec2::ZERO,
            time_horizon: 2.0,
            neighbor_dist: 100.0,
        }
    }
}

/// Projectile agent (§4.8 "fireball"). Spawned from the pool, integrated by
/// the same movement system as ordinary agents.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Projectile {
    pub owner: Entity,
    pub owner_faction: Faction,
    pub damage: f32,
    pub lifetime: f32,
    pub target: Option<Entity>,
}

/// Marker for pooled slots that are not currently part of the active
/// simulation (§4.9). Despawning is never used — components are reset and
/// this marker toggled instead.
#[derive(Component, Debug, Clone, Copy)]
pub struct Inactive;

/// Set by `deal_damage` (§4.8) the tick damage lands, consumed by the state
/// machine on the following tick to trigger the Hurt transition (§4.7
/// "damage taken"). Combat runs after the state machine in the tick
/// ordering (§4.10), so this is necessarily a one-tick-delayed signal.
#[derive(Component, Debug, Clone, Copy)]
pub struct JustDamaged;

/// Identifies which pool free-list a recycled entity belongs to.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentKind(pub u32);

/// A ranged agent's configured projectile pool kind (§6 "Agent config:
/// `projectile_id?`"). Absent on melee agents.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileKind(pub AgentKind);

/// Role bonus tag read by target scoring (§4.2 item 4). Defaults to
/// `Regular` for agents that don't opt into a bonus.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTag(pub crate::target::AgentRole);

impl Default for RoleTag {
    fn default() -> Self {
        RoleTag(crate::target::AgentRole::Regular)
    }
}

/// Convenience bundle for spawning a fresh combat agent, mirroring the
/// teacher's `SquadBundle` construction pattern.
#[derive(Bundle)]
pub struct AgentBundle {
    pub position: Position,
    pub velocity: Velocity,
    pub facing: Facing,
    pub health: Health,
    pub faction: Faction,
    pub behavior: Behavior,
    pub stats: AgentStats,
    pub last_attack: LastAttackTime,
    pub flags: AgentFlags,
    pub state: AgentState,
    pub state_timer: StateTimer,
    pub intent: Intent,
    pub intent_expiry: IntentExpiry,
    pub orca: OrcaAgent,
    pub kind: AgentKind,
}

impl AgentBundle {
    pub fn new(kind: AgentKind, faction: Faction, pos: Position, stats: AgentStats, behavior: Behavior) -> Self {
        Self {
            position: pos,
            velocity: Velocity::default(),
            facing: Facing::default(),
            health: Health::new(100.0),
            faction,
            behavior,
            stats,
            last_attack: LastAttackTime::default(),
            flags: AgentFlags {
                alive: true,
                from_pool: false,
                focus_locked: false,
                ranged: matches!(behavior, Behavior::Ranged),
            },
            state: AgentState::Idle,
            state_timer: StateTimer::default(),
            intent: Intent::None,
            intent_expiry: IntentExpiry::default(),
            orca: OrcaAgent::default(),
            kind,
        }
    }
}
