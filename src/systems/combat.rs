//! Combat and projectiles (§4.8): discrete `deal_damage`, ranged re-aim,
//! and the scheduled-damage/auto-recycle drain that the state machine
//! enqueues into `EventSchedule`.
//!
//! Grounded on the teacher's `combat.rs` for the "collect then apply"
//! shape and spatial-grid-driven target search; the teacher's
//! suppression/morale/cover math is dropped entirely (this spec has none of
//! those concepts) and replaced by the spec's binary hostile/not-hostile
//! damage model plus projectile entities, which the teacher never had.

use crate::components::*;
use crate::events::{CoreEvent, CoreEventBuffer};
use crate::faction::{Faction, FactionTable};
use crate::math::Vec2;
use crate::pool::Pool;
use crate::schedule::{EventSchedule, ScheduledKind};
use crate::spatial::{EntityType, QueryOptions, SpatialGridRes};
use crate::systems::performance::SimTick;
use crate::target::{TargetLocks, TargetResolver};
use bevy_ecs::prelude::*;

/// Per-facing spawn offset for a projectile, relative to its owner (§4.8
/// "`projectile_offsets[facing]`"). The full per-kind asset table is a host
/// concern (§6 "Agent config"); this crate only needs the direction, so a
/// fixed radius scaled by the owner's collider size stands in for it.
fn projectile_offset(facing: Facing, radius: f32) -> Vec2 {
    let dir = match facing {
        Facing::Right => Vec2::new(1.0, 0.0),
        Facing::Left => Vec2::new(-1.0, 0.0),
        Facing::Back => Vec2::new(0.0, 1.0),
        Facing::Front => Vec2::new(0.0, -1.0),
    };
    dir * radius
}

/// Applies `amount` of damage from `attacker`'s faction to `target`,
/// following the §4.8 contract exactly. A plain `&mut World` function
/// (rather than a `Query`-based system) since it needs sequential,
/// non-overlapping access to several resources and is called from more than
/// one system (the scheduled-damage drain, and host `ApplyDamage` events).
pub fn deal_damage(world: &mut World, attacker_faction: Faction, target: Entity, amount: f32, attacker: Option<Entity>) {
    let Some(&target_faction) = world.get::<Faction>(target) else {
        return;
    };
    let hostile = world.resource::<FactionTable>().are_hostile(attacker_faction, target_faction);
    if !hostile {
        return;
    }
    apply_damage_unconditional(world, target, amount, attacker);
}

/// External damage source (§6 "`apply_damage` ... external damage sources"):
/// bypasses the faction hostility gate entirely, since the damage isn't
/// attributed to another agent in the first place.
pub fn apply_external_damage(world: &mut World, target: Entity, amount: f32) {
    if world.get::<Faction>(target).is_none() {
        return;
    }
    apply_damage_unconditional(world, target, amount, None);
}

fn apply_damage_unconditional(world: &mut World, target: Entity, amount: f32, attacker: Option<Entity>) {
    let Some(mut health) = world.get_mut::<Health>(target) else {
        return;
    };
    health.damage(amount);
    let died = !health.is_alive();

    let mut events = world.resource_mut::<CoreEventBuffer>();
    events.push(CoreEvent::DamageDealt {
        attacker: attacker.unwrap_or(target),
        target,
        amount,
    });

    if died {
        events.push(CoreEvent::Death { agent: target });
        let mut locks = world.resource_mut::<TargetLocks>();
        locks.release_attacker(target);
        locks.release_target(target);
        let mut resolver = world.resource_mut::<TargetResolver>();
        resolver.memory.forget_observer(target);
        resolver.memory.forget_target_everywhere(target);
    } else {
        world.entity_mut(target).insert(JustDamaged);
    }
}

/// Drains `EventSchedule` entries due this tick: applies scheduled melee
/// damage (§4.7's `attack_damage_frame` timer) and returns dead/expired
/// projectiles to the pool (§4.9).
pub fn scheduled_event_drain_system(world: &mut World) {
    let tick = world.resource::<SimTick>().0;
    let due = world.resource_mut::<EventSchedule>().drain_due(tick);

    for kind in due {
        match kind {
            ScheduledKind::PerformDamage { attacker, target, amount } => {
                let Some(&attacker_faction) = world.get::<Faction>(attacker) else {
                    continue;
                };
                deal_damage(world, attacker_faction, target, amount, Some(attacker));
            }
            ScheduledKind::AutoRecycle { handle, kind } => {
                recycle_entity(world, handle, kind);
            }
            ScheduledKind::SpawnProjectile { attacker, target, projectile_kind } => {
                spawn_projectile_for_ranged_attack(world, attacker, target, projectile_kind);
            }
        }
    }
}

/// Returns `handle` to the pool: stops animation, clears timers/velocity,
/// marks `Inactive`, and emits `PoolRecycle` (§4.9 "On release").
pub fn recycle_entity(world: &mut World, handle: Entity, kind: AgentKind) {
    if let Some(mut vel) = world.get_mut::<Velocity>(handle) {
        vel.0 = Vec2::ZERO;
    }
    if let Some(mut timer) = world.get_mut::<StateTimer>(handle) {
        timer.elapsed = 0.0;
    }
    if let Some(mut state) = world.get_mut::<AgentState>(handle) {
        *state = AgentState::Idle;
    }
    world.entity_mut(handle).insert(Inactive);
    world.resource_mut::<SpatialGridRes>().0.unregister(handle);

    let mut pool = world.resource_mut::<Pool>();
    pool.release(kind, handle);

    let mut events = world.resource_mut::<CoreEventBuffer>();
    events.push(CoreEvent::PoolRecycle { handle, kind });
}

/// Integrates every live projectile one step and, if the step would cross a
/// hostile agent, applies damage and despawns it instead of moving through
/// (§4.8 "call `spatial_grid.predict_collision` ahead along velocity up to
/// one step"). A `&mut World` function rather than a `Query`-based system
/// since a hit needs to reach into `Health`/`FactionTable`/`CoreEventBuffer`
/// via `deal_damage`.
pub fn projectile_step_system(world: &mut World) {
    let delta = world.resource::<crate::systems::movement::DeltaTime>().0;

    let snapshot: Vec<(Entity, Vec2, Vec2, Faction, f32, Entity)> = {
        let mut query = world.query::<(Entity, &Position, &Velocity, &Projectile)>();
        query
            .iter(world)
            .map(|(e, pos, vel, projectile)| (e, pos.0, vel.0, projectile.owner_faction, projectile.damage, projectile.owner))
            .collect()
    };

    for (entity, pos, vel, owner_faction, damage, owner) in snapshot {
        let step = vel * delta;
        let step_len = step.length();
        if step_len <= f32::EPSILON {
            continue;
        }

        let hit = {
            let grid = world.resource::<SpatialGridRes>();
            let opts = QueryOptions {
                factions: None,
                entity_types: Some(vec![EntityType::Agent]),
                max_distance: None,
                ignore: Some(entity),
                only_alive: true,
            };
            grid.0.predict_collision(pos, step.normalized(), step_len, &opts)
        };

        if let Some(hit) = hit {
            if hit.faction != owner_faction {
                deal_damage(world, owner_faction, hit.handle, damage, Some(owner));
                world.resource_mut::<CoreEventBuffer>().push(CoreEvent::ProjectileDespawn { handle: entity });
                continue;
            }
        }

        if let Some(mut p) = world.get_mut::<Position>(entity) {
            p.0 = pos + step;
        }
    }
}

/// Ranged agent auto-fire: on entering the Attacking state a ranged agent
/// spawns a projectile from the pool instead of scheduling direct melee
/// damage (§4.8 "re-aim per shot").
pub fn spawn_projectile_for_ranged_attack(
    world: &mut World,
    attacker: Entity,
    target: Option<Entity>,
    projectile_kind: AgentKind,
) -> Option<Entity> {
    let &pos = world.get::<Position>(attacker)?;
    let &facing = world.get::<Facing>(attacker)?;
    let &faction = world.get::<Faction>(attacker)?;
    let &stats = world.get::<AgentStats>(attacker)?;

    let aim_point = target.and_then(|t| world.get::<Position>(t)).map(|p| p.0);
    let direction = match aim_point {
        Some(target_pos) => (target_pos - pos.0).normalized(),
        None => projectile_offset(facing, 1.0).normalized(),
    };

    let handle = world.resource_mut::<Pool>().try_acquire(projectile_kind)?;

    let spawn_pos = pos.0 + projectile_offset(facing, stats.radius);
    let velocity = direction * stats.max_speed.max(1.0) * 4.0;

    world.entity_mut(handle).remove::<Inactive>().insert((
        Position(spawn_pos),
        Velocity(velocity),
        Projectile {
            owner: attacker,
            owner_faction: faction,
            damage: stats.base_attack,
            lifetime: 2.0,
            target,
        },
    ));

    world.resource_mut::<CoreEventBuffer>().push(CoreEvent::ProjectileSpawn { handle, pos: spawn_pos });
    Some(handle)
}
