//! AgentBrain — the AI decision layer (§4.6). Publishes an `Intent`, never
//! executes it directly.
//!
//! Grounded on the teacher's `ai.rs` (`threat_awareness_system` /
//! `ai_order_system`): same "query the spatial grid, gate on a per-agent
//! interval, write a decision component" shape. The teacher's continuous
//! boids-flavored `Order`/`ThreatAwareness` pair is replaced wholesale by
//! the spec's discrete `Intent` enum with an expiry window, and by the
//! `TargetResolver`'s scored/locked candidate selection in place of
//! "nearest enemy wins".

use crate::components::*;
use crate::events::{CoreEvent, CoreEventBuffer};
use crate::faction::{Faction, FactionTable};
use crate::flowfield::FlowField;
use crate::math::Vec2;
use crate::spatial::{EntityType, QueryOptions, SpatialGridRes};
use crate::systems::performance::{SimClock, SimTick};
use crate::target::{has_line_of_sight, AgentRole, CandidateSnapshot, TargetLocks, TargetResolver, TargetResolverConfig};
use bevy_ecs::prelude::*;
use std::collections::HashMap;

/// Tuning for the brain's decision cadence, independent of per-agent
/// `DecideTimer` intervals (§4.6).
#[derive(Resource, Debug, Clone, Copy)]
pub struct BrainConfig {
    /// How long a published `Intent` stays valid once written (§4.6
    /// "Intents expire after a short validity window (~2-3s)").
    pub intent_validity_ticks: u64,
    /// Ticks without detection before Encounter reverts to Marching (§4.6).
    pub combat_timeout_ticks: u64,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            intent_validity_ticks: 75, // ~2.5s @ 30Hz
            combat_timeout_ticks: 90,  // ~3s @ 30Hz
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn agent_brain_system(
    dt: Res<crate::systems::movement::DeltaTime>,
    tick: Res<SimTick>,
    clock: Res<SimClock>,
    factions: Res<FactionTable>,
    grid: Res<SpatialGridRes>,
    flow: Option<Res<FlowField>>,
    brain_config: Res<BrainConfig>,
    resolver_config: Res<TargetResolverConfig>,
    mut resolver: ResMut<TargetResolver>,
    mut locks: ResMut<TargetLocks>,
    mut events: ResMut<CoreEventBuffer>,
    candidates_query: Query<(&Position, &Faction, &Health, &AgentStats, Option<&RoleTag>), Without<Inactive>>,
    mut ai_query: Query<
        (
            Entity,
            &Position,
            &Faction,
            &AgentStats,
            &LastAttackTime,
            &mut DecideTimer,
            &mut Intent,
            &mut IntentExpiry,
            Option<&mut MarchState>,
        ),
        (With<AIControlled>, Without<Inactive>),
    >,
) {
    let delta = dt.0;
    let now_tick = tick.0;

    for (entity, pos, faction, stats, last_attack, mut decide_timer, mut intent, mut expiry, march_state) in ai_query.iter_mut() {
        if !decide_timer.tick(delta) {
            continue;
        }

        let hostile_factions: Vec<Faction> = Faction::ALL
            .iter()
            .copied()
            .filter(|f| factions.are_hostile(*faction, *f))
            .collect();

        // §9 "`maxLineOfSightDistance` vs `detection_range`": LOS is the
        // looser bound, so a candidate beyond this range is never visible
        // even if nothing occludes the ray.
        let los_bound = resolver_config
            .max_line_of_sight_distance
            .max(resolver_config.combat_detection_range);

        let opts = QueryOptions {
            factions: Some(hostile_factions),
            entity_types: Some(vec![EntityType::Agent]),
            max_distance: Some(stats.detection_range),
            ignore: Some(entity),
            only_alive: true,
        };
        let hits = grid.0.query_radius(pos.0, stats.detection_range, &opts);

        let mut candidates = Vec::with_capacity(hits.len());
        for hit in &hits {
            if let Ok((cpos, cfaction, chealth, cstats, role)) = candidates_query.get(hit.handle) {
                let within_los_bound = pos.0.distance_to(cpos.0) <= los_bound;
                let visible = within_los_bound
                    && has_line_of_sight(
                        grid.0.as_ref(),
                        pos.0,
                        cpos.0,
                        *faction,
                        &factions,
                        resolver_config.allies_block_los,
                        resolver_config.enemies_block_los,
                    );
                if visible {
                    resolver.memory.observe(entity, hit.handle, cpos.0, now_tick);
                }
                candidates.push(CandidateSnapshot {
                    handle: hit.handle,
                    pos: cpos.0,
                    faction: *cfaction,
                    hp_fraction: chealth.fraction(),
                    base_attack: cstats.base_attack,
                    role: role.map(|r| r.0).unwrap_or(AgentRole::Regular),
                    is_visible: visible,
                    engaged_with_ally: locks.locked_attacker_of(hit.handle).is_some(),
                });
            }
        }

        // §4.2 item 7: for each candidate target, how many of this agent's
        // own-faction attackers already sit in each of the 8 sectors around
        // it, so the surround bonus/crowding penalty reflects real
        // positions instead of an always-empty stub.
        let mut sector_counts_by_target: HashMap<Entity, [u32; 8]> = HashMap::new();
        let encirclement_radius = stats.attack_range * 3.0;
        let allies_opts = QueryOptions {
            factions: Some(vec![*faction]),
            entity_types: Some(vec![EntityType::Agent]),
            max_distance: Some(encirclement_radius),
            ignore: None,
            only_alive: true,
        };
        for candidate in &candidates {
            let nearby_allies = grid.0.query_radius(candidate.pos, encirclement_radius, &allies_opts);
            let attacker_positions: Vec<Vec2> = nearby_allies.iter().map(|h| h.pos).collect();
            sector_counts_by_target.insert(candidate.handle, crate::target::sector_counts(candidate.pos, &attacker_positions));
        }

        let alive = |h: Entity| candidates_query.get(h).is_ok();

        let chosen = locks
            .locked_target_of(entity)
            .and_then(|target| candidates.iter().find(|c| c.handle == target))
            .map(|c| crate::target::TargetInfo {
                handle: c.handle,
                position: c.pos,
                faction: c.faction,
                score: 0.0,
            })
            .or_else(|| {
                resolver.find_and_lock(
                    entity,
                    pos.0,
                    &candidates,
                    &sector_counts_by_target,
                    &mut locks,
                    &alive,
                    &resolver_config,
                )
            });

        let detected_this_tick = chosen.is_some();

        let new_intent = match &chosen {
            Some(t) => {
                let dist = pos.0.distance_to(t.position);
                let cooldown_ready = last_attack.0 + stats.attack_interval <= clock.0;
                if dist <= stats.attack_range && cooldown_ready {
                    Intent::AttackTarget(t.handle)
                } else if dist <= stats.detection_range {
                    Intent::ChaseTarget(t.handle)
                } else {
                    Intent::Idle
                }
            }
            None => {
                // No live/visible candidate. Fall back to memory of a recently
                // seen hostile before giving up entirely (§4.2 "memory-augmented").
                let remembered = locks.locked_target_of(entity).filter(|&target| {
                    resolver.memory.is_fresh(entity, target, now_tick, resolver_config.memory_duration_ticks)
                });
                if let Some(target) = remembered {
                    resolver.memory.record_search_attempt(entity, target);
                    Intent::ChaseTarget(target)
                } else if let (Some(flow), Some(_)) = (&flow, &march_state) {
                    let direction = flow.direction_for(*faction, 0);
                    Intent::March(Vec2::new(direction.sign(), 0.0))
                } else {
                    Intent::Idle
                }
            }
        };

        if let Some(mut march_state) = march_state {
            match (*march_state, detected_this_tick) {
                (MarchState::Marching, true) => {
                    *march_state = MarchState::Encounter { since_tick: now_tick };
                }
                (MarchState::Encounter { .. }, true) => {
                    *march_state = MarchState::Encounter { since_tick: now_tick };
                }
                (MarchState::Encounter { since_tick }, false) => {
                    if now_tick.saturating_sub(since_tick) >= brain_config.combat_timeout_ticks {
                        *march_state = MarchState::Marching;
                    }
                }
                (MarchState::Marching, false) => {}
            }
        }

        if *intent != new_intent {
            *intent = new_intent;
            events.push(CoreEvent::AnimationRequest {
                agent: entity,
                state: AgentState::Idle, // animation re-selection is the state machine's job; this just signals an intent change happened.
            });
        }
        expiry.0 = now_tick + brain_config.intent_validity_ticks;
    }
}
