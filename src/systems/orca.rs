//! ORCA tick integration (§4.4 step 5 "ORCASolver.step() at its own
//! throttled interval"): wires the pure `orca::compute_line`/`solve`
//! functions into the ECS, following the same collect-then-apply shape the
//! teacher's `flocking_system` uses (gather neighbor state via the spatial
//! grid, compute per-agent, write back `Velocity` once).

use crate::components::*;
use crate::math::Vec2;
use crate::orca::{compute_line, reciprocity, solve, OrcaAgentSnapshot, OrcaConfig, OrcaLine};
use crate::spatial::{EntityType, QueryOptions, SpatialGridRes};
use bevy_ecs::prelude::*;

/// Resource gating ORCA's own step interval, independent of the tick rate
/// (§4.4 "own throttled interval").
#[derive(Resource, Debug, Clone, Copy)]
pub struct OrcaStepTimer {
    pub interval: f32,
    remaining: f32,
}

impl OrcaStepTimer {
    pub fn new(interval: f32) -> Self {
        Self { interval, remaining: 0.0 }
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

impl Default for OrcaStepTimer {
    fn default() -> Self {
        Self::new(1.0 / 30.0)
    }
}

/// Derives a preferred velocity from the agent's current `Intent`: zero for
/// `AttackTarget`/`Idle`/`None` (hold ground), direction-toward-target
/// scaled to `max_speed` for `ChaseTarget`/`MoveTo`/`March`.
fn preferred_velocity(intent: &Intent, pos: Vec2, max_speed: f32, target_positions: &Query<&Position>) -> Vec2 {
    let target_point = match *intent {
        Intent::ChaseTarget(target) => target_positions.get(target).ok().map(|p| p.0),
        Intent::MoveTo(point) => Some(point),
        Intent::March(direction) => Some(pos + direction),
        Intent::AttackTarget(_) | Intent::Idle | Intent::None => None,
    };

    match target_point {
        Some(point) if point.distance_sq_to(pos) > f32::EPSILON => (point - pos).normalized() * max_speed,
        _ => Vec2::ZERO,
    }
}

pub fn orca_step_system(
    dt: Res<crate::systems::movement::DeltaTime>,
    mut timer: ResMut<OrcaStepTimer>,
    config: Res<OrcaConfig>,
    grid: Res<SpatialGridRes>,
    target_positions: Query<&Position>,
    mut query: Query<(Entity, &Position, &mut Velocity, &Intent, &AgentStats, &AgentState, &Behavior, &OrcaAgent), Without<Inactive>>,
) {
    let delta = dt.0;
    if !timer.tick(delta) {
        return;
    }

    let snapshots: Vec<(Entity, OrcaAgentSnapshot, AgentState, Behavior)> = query
        .iter()
        .map(|(entity, pos, vel, intent, stats, state, behavior, orca)| {
            let pref_vel = preferred_velocity(intent, pos.0, stats.max_speed, &target_positions);
            (
                entity,
                OrcaAgentSnapshot {
                    pos: pos.0,
                    vel: vel.0,
                    pref_vel,
                    radius: stats.radius,
                    max_speed: stats.max_speed,
                    reciprocity: 0.5,
                    seed: entity.to_bits(),
                },
                *state,
                *behavior,
            )
        })
        .collect();

    let mut new_velocities = Vec::with_capacity(snapshots.len());

    for (entity, snapshot, state, behavior) in &snapshots {
        let opts = QueryOptions {
            factions: None,
            entity_types: Some(vec![EntityType::Agent]),
            max_distance: Some(snapshot.radius + 50.0),
            ignore: Some(*entity),
            only_alive: true,
        };
        let neighbors = grid.0.query_radius(snapshot.pos, snapshot.radius + 50.0, &opts);

        let lines: Vec<OrcaLine> = neighbors
            .iter()
            .filter_map(|hit| {
                let (_, other, other_state, other_behavior) = snapshots.iter().find(|(e, ..)| *e == hit.handle)?;
                let recip = reciprocity(*state, *behavior, *other_state);
                let mut a = *snapshot;
                a.reciprocity = recip;
                let _ = other_behavior;
                Some(compute_line(&a, other, config.time_horizon, delta))
            })
            .collect();

        let new_vel = solve(snapshot, &lines, &config);
        new_velocities.push((*entity, new_vel));
    }

    for (entity, new_vel) in new_velocities {
        if let Ok((_, _, mut vel, ..)) = query.get_mut(entity) {
            vel.0 = new_vel;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faction::Faction;
    use crate::spatial::Bucket2D;

    #[test]
    fn head_on_agents_gain_lateral_separation_after_one_step() {
        let mut world = World::new();
        world.insert_resource(crate::systems::movement::DeltaTime(1.0 / 30.0));
        world.insert_resource(OrcaStepTimer::new(0.0));
        world.insert_resource(OrcaConfig::default());

        let a = world
            .spawn((
                Position::new(0.0, 0.0),
                Velocity::new(1.0, 0.0),
                Intent::MoveTo(Vec2::new(20.0, 0.0)),
                AgentStats { max_speed: 2.0, radius: 5.0, ..Default::default() },
                AgentState::Walking,
                Behavior::Melee,
                OrcaAgent::default(),
            ))
            .id();
        let b = world
            .spawn((
                Position::new(10.0, 0.0),
                Velocity::new(-1.0, 0.0),
                Intent::MoveTo(Vec2::new(-10.0, 0.0)),
                AgentStats { max_speed: 2.0, radius: 5.0, ..Default::default() },
                AgentState::Walking,
                Behavior::Melee,
                OrcaAgent::default(),
            ))
            .id();

        let mut grid = Bucket2D::new(20.0);
        grid.register(a, Faction::Blue, EntityType::Agent, Vec2::new(0.0, 0.0));
        grid.register(b, Faction::Red, EntityType::Agent, Vec2::new(10.0, 0.0));
        world.insert_resource(SpatialGridRes::new(grid));

        let mut schedule = Schedule::default();
        schedule.add_systems(orca_step_system);
        schedule.run(&mut world);

        let va = world.get::<Velocity>(a).unwrap().0;
        let vb = world.get::<Velocity>(b).unwrap().0;
        assert!(va.y.abs() > 1e-3 || vb.y.abs() > 1e-3);
    }

    #[test]
    fn isolated_agent_converges_to_preferred_velocity() {
        let mut world = World::new();
        world.insert_resource(crate::systems::movement::DeltaTime(1.0 / 30.0));
        world.insert_resource(OrcaStepTimer::new(0.0));
        world.insert_resource(OrcaConfig::default());

        let a = world
            .spawn((
                Position::new(0.0, 0.0),
                Velocity::new(0.0, 0.0),
                Intent::MoveTo(Vec2::new(10.0, 0.0)),
                AgentStats { max_speed: 3.0, radius: 5.0, ..Default::default() },
                AgentState::Walking,
                Behavior::Melee,
                OrcaAgent::default(),
            ))
            .id();

        let mut grid = Bucket2D::new(20.0);
        grid.register(a, Faction::Blue, EntityType::Agent, Vec2::new(0.0, 0.0));
        world.insert_resource(SpatialGridRes::new(grid));

        let mut schedule = Schedule::default();
        schedule.add_systems(orca_step_system);
        schedule.run(&mut world);

        let va = world.get::<Velocity>(a).unwrap().0;
        assert!((va.length() - 3.0).abs() < 1e-3);
        assert!(va.x > 0.0);
    }
}
