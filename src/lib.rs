//! Combat Sim Core
//!
//! A deterministic, fixed-timestep ECS simulation core for a multi-agent
//! real-time combat game: spatial indexing, memory-augmented target
//! selection, ORCA local collision avoidance, a five-state agent FSM, A*
//! pathfinding, and combat/projectiles, driven by a fixed-timestep tick.
//! Uses `bevy_ecs` for the entity-component-system architecture.

pub mod api;
pub mod components;
pub mod error;
pub mod events;
pub mod faction;
pub mod flowfield;
pub mod math;
pub mod orca;
pub mod pathfind;
pub mod pool;
pub mod profiler;
pub mod schedule;
pub mod spatial;
pub mod systems;
pub mod target;
pub mod world;

pub use components::*;
pub use error::SimError;
pub use events::{CoreEvent, CoreEventBuffer, HostEvent, HostEventQueue};
pub use faction::{Faction, FactionRelations, FactionTable, Relation};
pub use flowfield::{Direction, FlowField};
pub use math::Vec2;
pub use orca::{OrcaAgentSnapshot, OrcaConfig, OrcaLine};
pub use pathfind::{Path, Pathfinder, PathfinderConfig};
pub use pool::Pool;
pub use schedule::{EventSchedule, ScheduledKind};
pub use spatial::{
    Bucket2D, EntityType, Grid1D, Hit, Nx3, QueryOptions, SpatialEntry, SpatialGridConfig, SpatialGridRes, SpatialGridSyncTimer,
    SpatialIndex,
};
pub use systems::*;
pub use target::{TargetInfo, TargetLocks, TargetResolver, TargetResolverConfig, TargetSweepTimer};
pub use world::Snapshot;
pub use api::{AgentConfig, LevelAgentSpec, SimWorld};
