//! AgentStateMachine — the five-state FSM (§4.7), driven by `Intent` and
//! damage events, never by animation callbacks from the host.
//!
//! Grounded on the teacher's `behavior_state_system` (`determine_behavior_state`
//! as a pure function plus a thin system wrapper) for the HOW; the state set
//! and guard table are entirely new (the teacher's `BehaviorState` models
//! squad posture, not a combat-animation FSM).

use crate::components::*;
use crate::events::{CoreEvent, CoreEventBuffer};
use crate::schedule::{EventSchedule, ScheduledKind};
use crate::systems::performance::{SimClock, SimTick};
use crate::target::{TargetLocks, TargetResolver};
use bevy_ecs::prelude::*;

fn wants_movement(intent: &Intent) -> bool {
    matches!(intent, Intent::ChaseTarget(_) | Intent::MoveTo(_) | Intent::March(_))
}

fn wants_attack(intent: &Intent) -> bool {
    matches!(intent, Intent::AttackTarget(_))
}

/// Pure transition function, unit-testable without a `World` (§4.7's table,
/// transcribed guard-for-guard).
#[allow(clippy::too_many_arguments)]
fn next_state(
    current: AgentState,
    intent: &Intent,
    hp_is_zero: bool,
    just_damaged: bool,
    cooldown_ready: bool,
    anim_finished: bool,
) -> AgentState {
    if hp_is_zero {
        return AgentState::Dead;
    }
    if current == AgentState::Dead {
        return AgentState::Dead;
    }
    if just_damaged && current != AgentState::Hurt {
        return AgentState::Hurt;
    }

    match current {
        AgentState::Idle => {
            if wants_attack(intent) && cooldown_ready {
                AgentState::Attacking
            } else if wants_movement(intent) {
                AgentState::Walking
            } else {
                AgentState::Idle
            }
        }
        AgentState::Walking => {
            if wants_attack(intent) && cooldown_ready {
                AgentState::Attacking
            } else if !wants_movement(intent) {
                AgentState::Idle
            } else {
                AgentState::Walking
            }
        }
        AgentState::Attacking => {
            if !anim_finished {
                AgentState::Attacking
            } else if wants_movement(intent) {
                AgentState::Walking
            } else {
                AgentState::Idle
            }
        }
        AgentState::Hurt => {
            if !anim_finished {
                AgentState::Hurt
            } else if wants_movement(intent) {
                AgentState::Walking
            } else {
                AgentState::Idle
            }
        }
        AgentState::Dead => AgentState::Dead,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn agent_state_machine_system(
    tick: Res<SimTick>,
    clock: Res<SimClock>,
    mut events: ResMut<CoreEventBuffer>,
    mut schedule: ResMut<EventSchedule>,
    mut locks: ResMut<TargetLocks>,
    mut resolver: ResMut<TargetResolver>,
    mut query: Query<
        (
            Entity,
            &Intent,
            &Health,
            &AgentStats,
            &Behavior,
            &AgentKind,
            &mut LastAttackTime,
            &mut AgentState,
            &mut StateTimer,
            Option<&JustDamaged>,
            Option<&ProjectileKind>,
        ),
        Without<Inactive>,
    >,
) {
    for (entity, intent, health, stats, behavior, agent_kind, mut last_attack, mut state, mut timer, just_damaged, projectile_kind) in
        query.iter_mut()
    {
        let previous = *state;
        let hp_is_zero = !health.is_alive();
        // The brain gates `Intent::AttackTarget` the same way, but that gate
        // only runs for `AIControlled` agents (§4.6); a manually-controlled
        // agent can have `set_intent` called every tick, so the state
        // machine re-checks the cooldown itself per §4.7's "enforced by the
        // brain and re-checked in the state machine".
        let cooldown_ready = last_attack.0 + stats.attack_interval <= clock.0;

        let anim_duration = match previous {
            AgentState::Attacking => stats.attack_anim_duration,
            AgentState::Hurt => stats.hurt_anim_duration,
            _ => 0.0,
        };
        let anim_finished = timer.elapsed >= anim_duration;

        let new_state = next_state(previous, intent, hp_is_zero, just_damaged.is_some(), cooldown_ready, anim_finished);

        if new_state == previous {
            continue;
        }

        match new_state {
            AgentState::Attacking => {
                events.push(CoreEvent::AnimationRequest { agent: entity, state: new_state });
                last_attack.0 = clock.0;
                let damage_time = stats.attack_damage_frame as f32 / stats.animation_speed.max(1.0);
                let due_tick = tick.0 + (damage_time * 30.0).round() as u64; // assumes ~30Hz tick rate; see api.rs fixed_dt.
                if let Intent::AttackTarget(target) = *intent {
                    match (*behavior, projectile_kind) {
                        (Behavior::Melee, _) => {
                            schedule.schedule(
                                due_tick,
                                ScheduledKind::PerformDamage {
                                    attacker: entity,
                                    target,
                                    amount: stats.base_attack,
                                },
                            );
                        }
                        (Behavior::Ranged, Some(&ProjectileKind(kind))) => {
                            schedule.schedule(
                                due_tick,
                                ScheduledKind::SpawnProjectile {
                                    attacker: entity,
                                    target: Some(target),
                                    projectile_kind: kind,
                                },
                            );
                        }
                        (Behavior::Ranged, None) => {}
                    }
                }
            }
            AgentState::Hurt => {
                events.push(CoreEvent::AnimationRequest { agent: entity, state: new_state });
            }
            AgentState::Dead => {
                events.push(CoreEvent::AnimationRequest { agent: entity, state: new_state });
                events.push(CoreEvent::Death { agent: entity });
                locks.release_attacker(entity);
                locks.release_target(entity);
                resolver.memory.forget_observer(entity);
                resolver.memory.forget_target_everywhere(entity);
                let recycle_due = tick.0 + (stats.auto_recycle_delay * 30.0).round() as u64;
                schedule.schedule(recycle_due, ScheduledKind::AutoRecycle { handle: entity, kind: *agent_kind });
            }
            _ => {
                events.push(CoreEvent::AnimationRequest { agent: entity, state: new_state });
            }
        }

        *state = new_state;
        timer.elapsed = 0.0;
    }
}

/// Advances every agent's `StateTimer` by `dt`; a separate system so the
/// FSM step itself stays a pure read-then-transition pass.
pub fn state_timer_system(dt: Res<crate::systems::movement::DeltaTime>, mut query: Query<&mut StateTimer, Without<Inactive>>) {
    let delta = dt.0;
    for mut timer in query.iter_mut() {
        timer.elapsed += delta;
    }
}

/// Clears `JustDamaged` once the state machine has had a chance to observe
/// it (consumed at the end of the tick, per the Tick Driver's step 9).
pub fn clear_just_damaged_system(mut commands: Commands, query: Query<Entity, With<JustDamaged>>) {
    for entity in query.iter() {
        commands.entity(entity).remove::<JustDamaged>();
    }
}
