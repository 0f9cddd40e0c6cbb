//! Public API for the simulation (§4.10 Tick Driver, §6 External interfaces).
//!
//! Grounded on the teacher's `api.rs` `SimWorld`: the fixed-timestep
//! accumulator (`step`/`fixed_update`/`step_profiled`) and `with_config`'s
//! ordered-schedule-building shape are kept almost unchanged; the
//! squad-spawning, terrain, and crater/barrage surface the teacher built on
//! top of that shape is replaced entirely by the spec's agent-config-driven
//! spawn/intent/damage/walkable host interface.

use crate::components::*;
use crate::events::{CoreEvent, CoreEventBuffer, HostEvent, HostEventQueue};
use crate::faction::{Faction, FactionTable};
use crate::flowfield::FlowField;
use crate::math::Vec2;
use crate::orca::OrcaConfig;
use crate::pathfind::{Pathfinder, PathfinderConfig};
use crate::pool::Pool;
use crate::schedule::EventSchedule;
use crate::spatial::{Bucket2D, EntityType, SpatialGridConfig, SpatialGridRes, SpatialGridSyncTimer};
use crate::systems::combat;
use crate::systems::*;
use crate::target::{TargetLocks, TargetResolver, TargetResolverConfig, TargetSweepTimer};
use crate::world::Snapshot;
use bevy_ecs::prelude::*;
use bevy_ecs::world::Mut;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-kind record driving spawn defaults (§6 "Agent config (input)"). The
/// spec's `asset_name_prefix`/`projectile_offsets`/`skills[]` fields are host
/// rendering/ability concerns with no counterpart in this crate's state and
/// are intentionally omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: u32,
    pub display_name: String,
    pub animation_speed: f32,
    pub attack_damage_frame: u32,
    pub max_hp: f32,
    pub base_attack: f32,
    pub attack_range: f32,
    pub attack_interval: f32,
    pub detection_range: f32,
    pub pursuit_range: f32,
    pub move_speed: f32,
    pub collider_size: f32,
    pub behavior: Behavior,
    pub projectile_id: Option<u32>,
    pub auto_recycle_delay: f32,
    pub attack_anim_duration: f32,
    pub hurt_anim_duration: f32,
    /// Whether spawned agents of this kind are driven by `AgentBrain`
    /// (§4.10 step 3 "for every AI-controlled agent") or purely by the
    /// host's `set_intent` calls (§4.10 step 1 "manual agents").
    pub ai_controlled: bool,
}

impl AgentConfig {
    fn to_stats(&self) -> AgentStats {
        AgentStats {
            config_id: self.id,
            radius: self.collider_size,
            max_speed: self.move_speed,
            base_attack: self.base_attack,
            attack_range: self.attack_range,
            detection_range: self.detection_range,
            attack_interval: self.attack_interval,
            pursuit_range: self.pursuit_range,
            attack_anim_duration: self.attack_anim_duration,
            hurt_anim_duration: self.hurt_anim_duration,
            attack_damage_frame: self.attack_damage_frame,
            animation_speed: self.animation_speed,
            auto_recycle_delay: self.auto_recycle_delay,
        }
    }
}

/// Per-kind spawn wave descriptor (§6 "Level descriptor (input)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelAgentSpec {
    pub agent_kind: AgentKind,
    pub initial_count: usize,
    pub max_count: usize,
    pub faction: Faction,
    pub spawn_points: Vec<Vec2>,
    pub behavior: Behavior,
}

/// The main simulation world container.
///
/// Holds the ECS world and schedule, providing a clean API for:
/// - Initializing the simulation
/// - Stepping the simulation forward
/// - Extracting state snapshots
/// - Issuing host commands
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    tick: u64,
    time: f32,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
    agent_configs: HashMap<u32, AgentConfig>,
}

impl SimWorld {
    /// Create a new empty simulation world.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Create a new simulation world with custom configuration.
    pub fn with_config(config: SimConfig) -> Self {
        let mut world = World::new();

        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(SpatialGridRes::new(Bucket2D::new(20.0)));
        let grid_config = SpatialGridConfig::default();
        world.insert_resource(SpatialGridSyncTimer::new(grid_config.update_interval_ms as f32 / 1000.0));
        world.insert_resource(grid_config);
        world.insert_resource(SimTick(0));
        world.insert_resource(SimClock(0.0));
        world.insert_resource(FactionTable::default_skirmish());
        world.insert_resource(TargetLocks::default());
        world.insert_resource(TargetResolver::default());
        world.insert_resource(TargetResolverConfig::default());
        world.insert_resource(TargetSweepTimer::default());
        world.insert_resource(OrcaConfig::default());
        world.insert_resource(OrcaStepTimer::default());
        world.insert_resource(BrainConfig::default());
        world.insert_resource(EventSchedule::default());
        world.insert_resource(CoreEventBuffer::default());
        world.insert_resource(HostEventQueue::default());
        world.insert_resource(Pool::default());
        world.insert_resource(FlowField::new());
        world.insert_resource(Pathfinder::new(PathfinderConfig::default()));
        world.insert_resource(config);

        // Schedule follows the Tick Driver's 9 steps (§4.10) exactly; step 1
        // (drain external input) happens directly in `fixed_update`, ahead of
        // `schedule.run`, since it spawns/mutates arbitrary entities from
        // `HostEvent`s rather than operating through a fixed `Query`.
        let mut schedule = Schedule::default();

        // Step 2.
        schedule.add_systems(spatial_grid_sync_system);

        // Step 3.
        schedule.add_systems(agent_brain_system.after(spatial_grid_sync_system));

        // Step 4.
        schedule.add_systems(
            (agent_state_machine_system, state_timer_system)
                .chain()
                .after(agent_brain_system),
        );

        // Step 5 (own throttled interval via `OrcaStepTimer`).
        schedule.add_systems(orca_step_system.after(agent_state_machine_system));

        // Step 6.
        schedule.add_systems(
            (
                scheduled_event_drain_system,
                projectile_step_system,
                movement_system,
                projectile_lifetime_system,
            )
                .chain()
                .after(orca_step_system),
        );

        // Step 7 (own throttled interval via `TargetSweepTimer`). Step 8
        // (pool recycle sweep) is folded into `scheduled_event_drain_system`'s
        // `AutoRecycle` handling above.
        schedule.add_systems(target_sweep_system.after(movement_system));

        // Step 9.
        schedule.add_systems(clear_just_damaged_system.after(target_sweep_system));

        Self {
            world,
            schedule,
            tick: 0,
            time: 0.0,
            time_accumulator: 0.0,
            agent_configs: HashMap::new(),
        }
    }

    /// Registers (or replaces) a per-kind `AgentConfig`, consulted by
    /// `spawn`/`spawn_level` (§6 "Agent config (input)").
    pub fn register_agent_config(&mut self, config: AgentConfig) {
        self.agent_configs.insert(config.id, config);
    }

    /// Pre-warms each kind's pool up to `max_count - initial_count` free
    /// slots and spawns `initial_count` active agents cycling through
    /// `spawn_points` (§4.9 "Pre-warm with per-kind initial counts from the
    /// level descriptor", §6 "Level descriptor (input)").
    pub fn spawn_level(&mut self, level: &[LevelAgentSpec]) {
        for spec in level {
            if let Some(config) = self.agent_configs.get(&spec.agent_kind.0).cloned() {
                let kind = spec.agent_kind;
                let faction = spec.faction;
                let behavior = config.behavior;
                let stats = config.to_stats();
                let max_hp = config.max_hp;
                let projectile_id = config.projectile_id;
                let prewarm_count = spec.max_count.saturating_sub(spec.initial_count);

                self.world.resource_scope(|world, mut pool: Mut<Pool>| {
                    pool.set_prewarm_count(kind, prewarm_count);
                    pool.prewarm(world, kind, |w| {
                        let mut bundle = AgentBundle::new(kind, faction, Position(Vec2::ZERO), stats, behavior);
                        bundle.health = Health::new(max_hp);
                        let mut entity = w.spawn(bundle);
                        if let Some(pid) = projectile_id {
                            entity.insert(ProjectileKind(AgentKind(pid)));
                        }
                        entity.id()
                    });
                });
            }

            let spawn_point_count = spec.spawn_points.len().max(1);
            for i in 0..spec.initial_count {
                let pos = spec.spawn_points.get(i % spawn_point_count).copied().unwrap_or(Vec2::ZERO);
                self.spawn(spec.agent_kind, pos, spec.faction);
            }
        }
    }

    /// Host→core event: `spawn(kind, pos, faction) → handle` (§6). Acquires
    /// a pooled handle if one is free, otherwise spawns fresh. Returns
    /// `None` if `kind` has no registered `AgentConfig` (§7 `ConfigMissing`:
    /// "logged and the spawn is skipped; not fatal").
    pub fn spawn(&mut self, kind: AgentKind, pos: Vec2, faction: Faction) -> Option<Entity> {
        let Some(config) = self.agent_configs.get(&kind.0).cloned() else {
            tracing::error!(kind = kind.0, "spawn: unknown agent kind");
            return None;
        };

        let handle = if let Some(handle) = self.world.resource_mut::<Pool>().try_acquire(kind) {
            // On acquire: reset hp, position, facing, flags (§4.9).
            self.world.entity_mut(handle).remove::<Inactive>().insert((
                Position(pos),
                faction,
                Health::new(config.max_hp),
                Facing::default(),
                Velocity::default(),
                AgentState::Idle,
                StateTimer::default(),
                Intent::None,
                IntentExpiry::default(),
            ));
            handle
        } else {
            let mut bundle = AgentBundle::new(kind, faction, Position(pos), config.to_stats(), config.behavior);
            bundle.health = Health::new(config.max_hp);
            let mut entity = self.world.spawn(bundle);
            if let Some(projectile_id) = config.projectile_id {
                entity.insert(ProjectileKind(AgentKind(projectile_id)));
            }
            entity.id()
        };

        let mut entity = self.world.entity_mut(handle);
        if config.ai_controlled {
            entity.insert((AIControlled, DecideTimer::new(0.2)));
        } else {
            entity.remove::<AIControlled>();
        }

        self.world
            .resource_mut::<SpatialGridRes>()
            .0
            .register(handle, faction, EntityType::Agent, pos);

        Some(handle)
    }

    /// Host→core event: `set_intent(handle, intent)` (§6, manual mode). A
    /// no-op if `agent` has already been recycled.
    pub fn set_intent(&mut self, agent: Entity, intent: Intent) {
        if let Some(mut current) = self.world.get_mut::<Intent>(agent) {
            *current = intent;
        }
    }

    /// Host→core event: `apply_damage(handle, amount)` (§6, external damage
    /// sources — bypasses the faction hostility gate that gates agent-vs-agent
    /// combat).
    pub fn apply_damage(&mut self, target: Entity, amount: f32) {
        combat::apply_external_damage(&mut self.world, target, amount);
    }

    /// Host→core event: `set_walkable(rect, walkable)` (§6), simplified to a
    /// point sample per §9 (see `events::HostEvent::SetWalkable`).
    pub fn set_walkable(&mut self, pos: Vec2, walkable: bool) {
        self.world.resource_mut::<Pathfinder>().mark_walkable(pos, walkable);
    }

    /// Queues a `HostEvent` for processing at the start of the next fixed
    /// update (§4.10 step 1), rather than applying it immediately. Use the
    /// direct methods (`spawn`/`set_intent`/`apply_damage`/`set_walkable`)
    /// for synchronous application instead.
    pub fn push_event(&mut self, event: HostEvent) {
        self.world.resource_mut::<HostEventQueue>().push(event);
    }

    fn drain_host_events(&mut self) {
        let events = self.world.resource_mut::<HostEventQueue>().drain();
        for event in events {
            match event {
                HostEvent::Spawn { kind, faction, pos } => {
                    self.spawn(kind, pos, faction);
                }
                HostEvent::SetIntent { agent, intent } => self.set_intent(agent, intent),
                HostEvent::ApplyDamage { target, amount } => self.apply_damage(target, amount),
                HostEvent::SetWalkable { pos, walkable } => self.set_walkable(pos, walkable),
            }
        }
    }

    /// Drains this tick's `CoreEvent`s (§6 "Core→host events, one-shot per
    /// tick"). Call once after each `step`.
    pub fn drain_events(&mut self) -> Vec<CoreEvent> {
        self.world.resource_mut::<CoreEventBuffer>().drain()
    }

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Uses fixed timestep internally - accumulates time and runs fixed
    /// updates as needed. This ensures deterministic behavior regardless of
    /// frame rate (§4.10, §5 "Determinism").
    pub fn step(&mut self, dt: f32) {
        let fixed_dt = self.world.get_resource::<SimConfig>().map(|c| c.fixed_timestep).unwrap_or(1.0 / 30.0);

        self.time_accumulator += dt;
        while self.time_accumulator >= fixed_dt {
            self.fixed_update(fixed_dt);
            self.time_accumulator -= fixed_dt;
        }
    }

    /// Run a single fixed timestep update: steps 1-9 of the Tick Driver.
    fn fixed_update(&mut self, dt: f32) {
        if let Some(mut dt_res) = self.world.get_resource_mut::<DeltaTime>() {
            dt_res.0 = dt;
        }
        if let Some(mut tick_res) = self.world.get_resource_mut::<SimTick>() {
            tick_res.increment();
        }
        if let Some(mut clock) = self.world.get_resource_mut::<SimClock>() {
            clock.advance(dt);
        }

        // Step 1.
        self.drain_host_events();

        // Steps 2-9.
        self.schedule.run(&mut self.world);

        self.tick += 1;
        self.time += dt;

        self.world.resource_mut::<Pathfinder>().process_requests(self.tick);
    }

    /// Step with profiling - returns the time taken for the fixed update(s).
    ///
    /// Useful for stress tests measuring per-tick performance.
    #[cfg(any(test, feature = "profile"))]
    pub fn step_profiled(&mut self, dt: f32) -> std::time::Duration {
        use std::time::Instant;

        let fixed_dt = self.world.get_resource::<SimConfig>().map(|c| c.fixed_timestep).unwrap_or(1.0 / 30.0);

        self.time_accumulator += dt;
        let mut total_duration = std::time::Duration::ZERO;

        while self.time_accumulator >= fixed_dt {
            let start = Instant::now();
            self.fixed_update(fixed_dt);
            total_duration += start.elapsed();
            self.time_accumulator -= fixed_dt;
        }

        total_duration
    }

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        Snapshot::from_world(&mut self.world, self.tick, self.time)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}
