//! Target scoring, sector geometry, and role bonuses (§4.2 items 1-9).
//!
//! New module — the teacher's `ai.rs` `threat_awareness_system` only
//! computes a `threat_level` float for flocking weights, not a ranked
//! candidate score with lock/sector/role adjustments. The fold-over-
//! candidates shape here follows the teacher's "gather candidates from the
//! spatial grid, then reduce" idiom, applied to the spec's richer formula.

use crate::faction::Faction;
use crate::math::Vec2;
use bevy_ecs::entity::Entity;
use serde::{Deserialize, Serialize};

/// Target "role" bonus (§4.2 item 4). Distinct from `Faction` — any faction
/// may contain elites/bosses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentRole {
    Regular,
    Elite,
    Boss,
    PlayerCharacter,
}

impl AgentRole {
    fn type_bonus(self) -> f32 {
        match self {
            AgentRole::PlayerCharacter => 300.0,
            AgentRole::Boss => 150.0,
            AgentRole::Elite => 50.0,
            AgentRole::Regular => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CandidateSnapshot {
    pub handle: Entity,
    pub pos: Vec2,
    pub faction: Faction,
    pub hp_fraction: f32,
    pub base_attack: f32,
    pub role: AgentRole,
    pub is_visible: bool,
    pub engaged_with_ally: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoringConfig {
    pub sector_crowding_threshold: u32,
    pub sector_crowding_penalty: f32,
    pub surround_bonus: f32,
    pub locked_pair_penalty: f32,
    pub combat_priority_penalty: f32,
    pub enable_surround: bool,
    pub enable_one_vs_one: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    LockedByOther,
    LockedPair,
}

/// One of 8 π/4-wide angular bins around a target, used to score
/// encirclement (§GLOSSARY "Sector").
pub fn sector_of(target_pos: Vec2, attacker_pos: Vec2) -> u8 {
    let delta = attacker_pos - target_pos;
    let angle = delta.y.atan2(delta.x);
    let normalized = if angle < 0.0 {
        angle + std::f32::consts::TAU
    } else {
        angle
    };
    ((normalized / (std::f32::consts::PI / 4.0)).floor() as u8) % 8
}

pub fn sector_counts(target_pos: Vec2, attacker_positions: &[Vec2]) -> [u32; 8] {
    let mut counts = [0u32; 8];
    for &pos in attacker_positions {
        counts[sector_of(target_pos, pos) as usize] += 1;
    }
    counts
}

/// Full scoring pipeline, §4.2 items 1-9, applied left to right.
#[allow(clippy::too_many_arguments)]
pub fn score_candidate(
    observer_pos: Vec2,
    candidate: &CandidateSnapshot,
    attacker_sector: u8,
    sector_counts: &[u32; 8],
    lock_state: LockState,
    attacker_already_locked_elsewhere: bool,
    config: &ScoringConfig,
) -> f32 {
    // 1. Base.
    let mut score = 100.0;

    // 2. Wounded first.
    score += 100.0 * (1.0 - candidate.hp_fraction);

    // 3. Threat.
    score += 30.0 * (candidate.base_attack / 50.0);

    // 4. Type bonus.
    score += candidate.role.type_bonus();

    // 5. Distance factor.
    let d = observer_pos.distance_to(candidate.pos);
    let distance_factor = 0.5 + 0.5 * (200.0 - d).max(0.0) / 200.0;
    score *= distance_factor;

    // 6. LOS bonus.
    if candidate.is_visible {
        score *= 1.2;
    }

    // 7. Surround adjustment.
    if config.enable_surround {
        let this_sector = sector_counts[attacker_sector as usize];
        if this_sector >= config.sector_crowding_threshold {
            score *= config.sector_crowding_penalty;
        } else {
            let left = (attacker_sector + 1) % 8;
            let right = (attacker_sector + 7) % 8;
            let opposite = (attacker_sector + 4) % 8;
            if sector_counts[left as usize] == 0 || sector_counts[right as usize] == 0 {
                score *= config.surround_bonus;
            } else if sector_counts[opposite as usize] == 0 {
                score *= 0.8 * config.surround_bonus;
            }
        }
    }

    // 8. Lock adjustments.
    if config.enable_one_vs_one {
        match lock_state {
            LockState::LockedByOther => score *= 0.05,
            LockState::LockedPair => score *= config.locked_pair_penalty,
            LockState::Unlocked => {
                if attacker_already_locked_elsewhere {
                    score *= 0.05;
                }
            }
        }
    }

    // 9. Combat priority penalty (only applies when no lock-related
    // multiplier from item 8 already fired for this candidate).
    if lock_state == LockState::Unlocked
        && !attacker_already_locked_elsewhere
        && candidate.engaged_with_ally
    {
        score *= config.combat_priority_penalty;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_of_cardinal_directions() {
        assert_eq!(sector_of(Vec2::ZERO, Vec2::new(10.0, 0.0)), 0);
        assert_eq!(sector_of(Vec2::ZERO, Vec2::new(0.0, 10.0)), 2);
        assert_eq!(sector_of(Vec2::ZERO, Vec2::new(-10.0, 0.0)), 4);
        assert_eq!(sector_of(Vec2::ZERO, Vec2::new(0.0, -10.0)), 6);
    }

    fn base_candidate() -> CandidateSnapshot {
        CandidateSnapshot {
            handle: Entity::from_raw(1),
            pos: Vec2::new(10.0, 0.0),
            faction: Faction::Red,
            hp_fraction: 1.0,
            base_attack: 10.0,
            role: AgentRole::Regular,
            is_visible: true,
            engaged_with_ally: false,
        }
    }

    fn base_config() -> ScoringConfig {
        ScoringConfig {
            sector_crowding_threshold: 3,
            sector_crowding_penalty: 0.2,
            surround_bonus: 2.0,
            locked_pair_penalty: 0.2,
            combat_priority_penalty: 0.3,
            enable_surround: true,
            enable_one_vs_one: true,
        }
    }

    #[test]
    fn wounded_targets_score_higher() {
        let config = base_config();
        let mut healthy = base_candidate();
        healthy.hp_fraction = 1.0;
        let mut wounded = base_candidate();
        wounded.hp_fraction = 0.1;

        let counts = [0u32; 8];
        let s_healthy = score_candidate(Vec2::ZERO, &healthy, 0, &counts, LockState::Unlocked, false, &config);
        let s_wounded = score_candidate(Vec2::ZERO, &wounded, 0, &counts, LockState::Unlocked, false, &config);
        assert!(s_wounded > s_healthy);
    }

    #[test]
    fn locked_by_other_heavily_penalized() {
        let config = base_config();
        let candidate = base_candidate();
        let counts = [0u32; 8];
        let free = score_candidate(Vec2::ZERO, &candidate, 0, &counts, LockState::Unlocked, false, &config);
        let locked = score_candidate(Vec2::ZERO, &candidate, 0, &counts, LockState::LockedByOther, false, &config);
        assert!(locked < free * 0.1);
    }

    #[test]
    fn player_role_outweighs_regular() {
        let config = base_config();
        let mut player = base_candidate();
        player.role = AgentRole::PlayerCharacter;
        let regular = base_candidate();
        let counts = [0u32; 8];
        let s_player = score_candidate(Vec2::ZERO, &player, 0, &counts, LockState::Unlocked, false, &config);
        let s_regular = score_candidate(Vec2::ZERO, &regular, 0, &counts, LockState::Unlocked, false, &config);
        assert!(s_player > s_regular);
    }
}
