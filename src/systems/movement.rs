//! Movement integration (§4.10 step 9: apply committed velocity to position).
//!
//! Grounded on the teacher's `movement_system`: same `Res<DeltaTime>` +
//! `Query<(&mut Position, &Velocity)>` shape. The teacher's
//! suppression/morale/terrain speed multipliers are dropped — this spec has
//! no such concepts — and projectile lifetime/expiry integration is added,
//! since the teacher has no projectile entities at all.

use crate::components::*;
use crate::events::{CoreEvent, CoreEventBuffer};
use bevy_ecs::prelude::*;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// Integrates `Position` from the post-ORCA `Velocity`, and updates
/// `Facing` from the resulting movement direction (§3 Agent record).
pub fn movement_system(dt: Res<DeltaTime>, mut query: Query<(&mut Position, &Velocity, &mut Facing), Without<Inactive>>) {
    let delta = dt.0;
    for (mut pos, vel, mut facing) in query.iter_mut() {
        pos.0 = pos.0 + vel.0 * delta;
        if let Some(new_facing) = Facing::from_movement(vel.0) {
            *facing = new_facing;
        }
    }
}

/// Advances projectile lifetime and emits `ProjectileDespawn` for any that
/// have expired, so the caller can return them to the pool (§4.8).
pub fn projectile_lifetime_system(
    dt: Res<DeltaTime>,
    mut events: ResMut<CoreEventBuffer>,
    mut query: Query<(Entity, &mut Projectile), Without<Inactive>>,
) {
    let delta = dt.0;
    for (entity, mut projectile) in query.iter_mut() {
        projectile.lifetime -= delta;
        if projectile.lifetime <= 0.0 {
            events.push(CoreEvent::ProjectileDespawn { handle: entity });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faction::Faction;

    #[test]
    fn movement_applies_velocity_and_updates_facing() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(1.0));

        world.spawn((Position::new(0.0, 0.0), Velocity::new(5.0, 0.0), Facing::default()));

        let mut schedule = Schedule::default();
        schedule.add_systems(movement_system);
        schedule.run(&mut world);

        let mut query = world.query::<(&Position, &Facing)>();
        let (pos, facing) = query.single(&world);
        assert!((pos.0.x - 5.0).abs() < 0.001);
        assert_eq!(*facing, Facing::Right);
    }

    #[test]
    fn inactive_entities_do_not_move() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(1.0));
        world.spawn((Position::new(0.0, 0.0), Velocity::new(5.0, 0.0), Facing::default(), Inactive));

        let mut schedule = Schedule::default();
        schedule.add_systems(movement_system);
        schedule.run(&mut world);

        let mut query = world.query::<&Position>();
        let pos = query.single(&world);
        assert_eq!(pos.0.x, 0.0);
    }

    #[test]
    fn expired_projectile_emits_despawn_event() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(1.0));
        world.insert_resource(CoreEventBuffer::default());
        world.spawn(Projectile {
            owner: Entity::from_raw(1),
            owner_faction: Faction::Red,
            damage: 10.0,
            lifetime: 0.5,
            target: None,
        });

        let mut schedule = Schedule::default();
        schedule.add_systems(projectile_lifetime_system);
        schedule.run(&mut world);

        let mut events = world.resource_mut::<CoreEventBuffer>();
        let drained = events.drain();
        assert_eq!(drained.len(), 1);
        assert!(matches!(drained[0], CoreEvent::ProjectileDespawn { .. }));
    }
}
