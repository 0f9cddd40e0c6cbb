//! End-to-end scenario tests (§8). S2 (spatial variants), S3 (ORCA
//! reciprocal separation), and S4 (pathfinding) are already covered as
//! module-level unit tests in `spatial/`, `systems/orca.rs`, and
//! `pathfind/mod.rs` respectively; this file covers the scenarios that need
//! a full multi-tick simulation to observe.

use combat_sim::*;

/// Captures `tracing` output under `cargo test -- --nocapture` (§3 ambient
/// logging); safe to call from every test since `try_init` only installs
/// the subscriber once per process.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn melee_config(id: u32, max_hp: f32, base_attack: f32, ai_controlled: bool) -> AgentConfig {
    AgentConfig {
        id,
        display_name: format!("melee-{id}"),
        animation_speed: 12.0,
        attack_damage_frame: 5,
        max_hp,
        base_attack,
        attack_range: 15.0,
        attack_interval: 1.0,
        detection_range: 50.0,
        pursuit_range: 60.0,
        move_speed: 3.0,
        collider_size: 5.0,
        behavior: Behavior::Melee,
        projectile_id: None,
        auto_recycle_delay: 2.0,
        attack_anim_duration: 0.5,
        hurt_anim_duration: 0.3,
        ai_controlled,
    }
}

/// S1: two 30-HP Red melee agents both hostile to one 30-HP Blue melee
/// agent standing within attack range of each. The 1v1 lock invariant
/// (§4.2) means only one Red can ever hold the lock on Blue, so Blue takes
/// damage from a single attacker at a time rather than from both at once.
#[test]
fn s1_one_vs_one_lock_limits_blue_to_a_single_attacker() {
    init_tracing();
    let mut sim = SimWorld::new();
    sim.register_agent_config(melee_config(1, 30.0, 10.0, true)); // Red, AI
    sim.register_agent_config(melee_config(2, 30.0, 10.0, false)); // Blue, manual (stands still)

    let blue = sim.spawn(AgentKind(2), Vec2::new(0.0, 0.0), Faction::Blue).unwrap();
    let red_a = sim.spawn(AgentKind(1), Vec2::new(5.0, 0.0), Faction::Red).unwrap();
    let red_b = sim.spawn(AgentKind(1), Vec2::new(-5.0, 0.0), Faction::Red).unwrap();

    let fixed = sim.world().resource::<SimConfig>().fixed_timestep;
    let mut attackers_seen = std::collections::HashSet::new();
    for _ in 0..150 {
        sim.step(fixed);
        for event in sim.drain_events() {
            if let CoreEvent::DamageDealt { attacker, target, .. } = event {
                assert_eq!(target, blue, "only Blue should ever take damage in this scenario");
                attackers_seen.insert(attacker);
            }
        }
        if sim.world().get::<Health>(blue).map(|h| !h.is_alive()).unwrap_or(true) {
            break;
        }
    }

    assert_eq!(attackers_seen.len(), 1, "exactly one Red should have landed damage, per the 1v1 lock");
    assert!(attackers_seen.contains(&red_a) || attackers_seen.contains(&red_b));

    let blue_health = sim.world().get::<Health>(blue);
    assert!(blue_health.map(|h| h.current < 30.0).unwrap_or(true), "Blue should have taken at least one hit");
}

/// S5: a ranged agent re-aims and fires a fireball (§4.8) at a stationary
/// target, dealing 75 damage on impact.
#[test]
fn s5_ranged_fireball_hits_and_deals_damage() {
    init_tracing();
    let mut sim = SimWorld::new();
    let mut lich = melee_config(10, 100.0, 75.0, true);
    lich.behavior = Behavior::Ranged;
    lich.projectile_id = Some(20);
    lich.attack_range = 40.0;
    lich.detection_range = 60.0;
    sim.register_agent_config(lich);
    sim.register_agent_config(melee_config(11, 100.0, 0.0, false));
    sim.register_agent_config(melee_config(20, 1.0, 0.0, false));

    // Pre-warm one pooled fireball entity for kind 20.
    sim.spawn_level(&[LevelAgentSpec {
        agent_kind: AgentKind(20),
        initial_count: 0,
        max_count: 1,
        faction: Faction::Red,
        spawn_points: vec![],
        behavior: Behavior::Ranged,
    }]);

    let attacker = sim.spawn(AgentKind(10), Vec2::new(0.0, 0.0), Faction::Red).unwrap();
    let target = sim.spawn(AgentKind(11), Vec2::new(10.0, 0.0), Faction::Blue).unwrap();
    let _ = attacker;

    let fixed = sim.world().resource::<SimConfig>().fixed_timestep;
    let mut spawned_projectile = false;
    let mut dealt_damage = None;
    for _ in 0..120 {
        sim.step(fixed);
        for event in sim.drain_events() {
            match event {
                CoreEvent::ProjectileSpawn { .. } => spawned_projectile = true,
                CoreEvent::DamageDealt { target: t, amount, .. } if t == target => dealt_damage = Some(amount),
                _ => {}
            }
        }
        if dealt_damage.is_some() {
            break;
        }
    }

    assert!(spawned_projectile, "the ranged attacker should have fired a projectile");
    assert_eq!(dealt_damage, Some(75.0));

    let target_health = sim.world().get::<Health>(target).unwrap();
    assert_eq!(target_health.current, 25.0);
}

/// S6: on a 30-column 1D band, two opposing factions march toward each
/// other (§4.5's degenerate flow field) until they come within detection
/// range, at which point each flips from `MarchState::Marching` to
/// `MarchState::Encounter` (§4.6).
#[test]
fn s6_marching_flips_to_encounter_on_1d_band() {
    init_tracing();
    use bevy_ecs::prelude::*;

    let mut world = World::new();
    world.insert_resource(DeltaTime(0.0));
    world.insert_resource(SimTick(0));
    world.insert_resource(SimClock(0.0));
    world.insert_resource(FactionTable::default_skirmish());
    world.insert_resource(TargetLocks::default());
    world.insert_resource(TargetResolver::default());
    world.insert_resource(TargetResolverConfig::default());
    world.insert_resource(TargetSweepTimer::default());
    world.insert_resource(OrcaConfig::default());
    world.insert_resource(OrcaStepTimer::new(0.0));
    world.insert_resource(BrainConfig::default());
    world.insert_resource(CoreEventBuffer::default());

    let mut field = FlowField::new();
    field.set_direction(Faction::Blue, Direction::Right);
    field.set_direction(Faction::Red, Direction::Left);
    world.insert_resource(field);

    let stats = AgentStats {
        config_id: 1,
        radius: 2.0,
        max_speed: 50.0,
        base_attack: 10.0,
        attack_range: 5.0,
        detection_range: 30.0,
        attack_interval: 1.0,
        pursuit_range: 300.0,
        attack_anim_duration: 0.3,
        hurt_anim_duration: 0.2,
        attack_damage_frame: 5,
        animation_speed: 12.0,
        auto_recycle_delay: 2.0,
    };

    let blue = world
        .spawn((
            (
                Position::new(5.0, 0.0),
                Velocity::default(),
                Facing::default(),
                Faction::Blue,
                Behavior::Melee,
                stats,
                Health::new(100.0),
                LastAttackTime::default(),
            ),
            (
                AgentState::Idle,
                StateTimer::default(),
                Intent::None,
                IntentExpiry::default(),
                MarchState::Marching,
                DecideTimer::new(0.0),
                OrcaAgent::default(),
                AIControlled,
            ),
        ))
        .id();
    let red = world
        .spawn((
            (
                Position::new(295.0, 0.0),
                Velocity::default(),
                Facing::default(),
                Faction::Red,
                Behavior::Melee,
                stats,
                Health::new(100.0),
                LastAttackTime::default(),
            ),
            (
                AgentState::Idle,
                StateTimer::default(),
                Intent::None,
                IntentExpiry::default(),
                MarchState::Marching,
                DecideTimer::new(0.0),
                OrcaAgent::default(),
                AIControlled,
            ),
        ))
        .id();

    world.insert_resource(SpatialGridRes::new(Grid1D::new(30, 300.0)));
    world.insert_resource(SpatialGridSyncTimer::new(0.0));

    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            combat_sim::spatial::spatial_grid_sync_system,
            agent_brain_system,
            (agent_state_machine_system, state_timer_system).chain(),
            orca_step_system,
            movement_system,
            combat_sim::target::target_sweep_system,
            clear_just_damaged_system,
        )
            .chain(),
    );

    let dt = 1.0 / 30.0;
    let mut flipped = false;
    for tick in 1..=300u64 {
        world.resource_mut::<DeltaTime>().0 = dt;
        world.resource_mut::<SimTick>().0 = tick;
        world.resource_mut::<SimClock>().advance(dt);
        schedule.run(&mut world);

        let blue_march = *world.get::<MarchState>(blue).unwrap();
        let red_march = *world.get::<MarchState>(red).unwrap();
        if matches!(blue_march, MarchState::Encounter { .. }) && matches!(red_march, MarchState::Encounter { .. }) {
            flipped = true;
            break;
        }
    }

    assert!(flipped, "both agents should have flipped from Marching to Encounter once in detection range");

    let blue_pos = world.get::<Position>(blue).unwrap().0;
    let red_pos = world.get::<Position>(red).unwrap().0;
    assert!(blue_pos.x > 5.0, "Blue should have marched right toward Red");
    assert!(red_pos.x < 295.0, "Red should have marched left toward Blue");
}
