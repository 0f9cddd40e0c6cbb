//! ORCA — Optimal Reciprocal Collision Avoidance (§4.4).
//!
//! Grounded directly on
//! `examples/other_examples/5a35da50_kennerCreates-flume-sugar__src-engine-orca.rs.rs`,
//! the closest match in the corpus: its `orca_halfplane` truncated-cone
//! construction (cap-vs-leg branch via `dot < 0 && dot² > R²·|w|²`, tangent
//! leg selection via the sign of `det(relPos, w)`) and its `lp1`/`lp2`/`lp3`
//! incremental 2D linear program are the structural template this module
//! follows, retargeted from `glam::Vec2` to this crate's local `Vec2`
//! (`math.rs`) and from the reference's fixed priority-based 0.2/0.8
//! responsibility split to the spec's continuous `reciprocity` float.

mod lp;

use crate::components::{AgentState, Behavior};
use crate::math::Vec2;
use lp::{linear_program2, linear_program3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A feasibility half-plane: `{v : (v - point) . direction >= 0}` (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrcaLine {
    pub point: Vec2,
    pub direction: Vec2,
}

#[derive(bevy_ecs::system::Resource, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrcaConfig {
    pub time_horizon: f32,
    pub time_horizon_obst: f32,
    pub max_iterations: u32,
    pub convergence_tolerance: f32,
}

impl Default for OrcaConfig {
    fn default() -> Self {
        Self {
            time_horizon: 2.0,
            time_horizon_obst: 1.0,
            max_iterations: 20,
            convergence_tolerance: 1e-4,
        }
    }
}

/// Snapshot of one agent's ORCA-relevant state, passed by value so the
/// solver never needs simultaneous mutable access to the `Query` it was
/// read from (same two-phase collect-then-apply discipline as the
/// teacher's `combat.rs`).
#[derive(Debug, Clone, Copy)]
pub struct OrcaAgentSnapshot {
    pub pos: Vec2,
    pub vel: Vec2,
    pub pref_vel: Vec2,
    pub radius: f32,
    pub max_speed: f32,
    pub reciprocity: f32,
    pub seed: u64,
}

/// Reciprocity resolved from both agents' behavior tag and current FSM
/// state (§9 Open Question: reciprocity is a single float in [0,1], not a
/// tangle of boolean predicates). A focus-locked/attacking agent stands its
/// ground more and yields less; a passive (non-combat, non-ranged) agent
/// yields more.
pub fn reciprocity(a_state: AgentState, a_behavior: Behavior, b_state: AgentState) -> f32 {
    let a_resistant = matches!(a_state, AgentState::Attacking) || a_behavior == Behavior::Ranged;
    let b_resistant = matches!(b_state, AgentState::Attacking);
    match (a_resistant, b_resistant) {
        (true, true) => 0.5,
        (true, false) => 0.2,
        (false, true) => 0.8,
        (false, false) => 0.5,
    }
}

/// Computes one ORCA half-plane for `a` given neighbor `b`.
///
/// Per §4.4: `relPos = posB - posA`, `relVel = velA - velB`, `R = rA + rB`,
/// `tau = time_horizon`. Non-overlapping agents construct the truncated
/// velocity-obstacle cone; overlapping agents get a one-step separation
/// push instead.
pub fn compute_line(a: &OrcaAgentSnapshot, b: &OrcaAgentSnapshot, tau: f32, dt: f32) -> OrcaLine {
    let rel_pos = b.pos - a.pos;
    let rel_vel = a.vel - b.vel;
    let combined_radius = a.radius + b.radius;
    let combined_radius_sq = combined_radius * combined_radius;
    let dist_sq = rel_pos.length_sq();

    let (direction, u) = if dist_sq > combined_radius_sq {
        let apex = rel_pos / tau;
        let w = rel_vel - apex;
        let w_length_sq = w.length_sq();
        let dot = w.dot(rel_pos);

        if dot < 0.0 && dot * dot > combined_radius_sq * w_length_sq {
            // Nearer to the cone's rounded cap: push directly away along w.
            let w_length = w_length_sq.sqrt();
            if w_length < f32::EPSILON {
                let tangent = degenerate_tangent(a.seed ^ b.seed);
                (tangent, tangent * (combined_radius / tau))
            } else {
                let unit_w = w / w_length;
                let direction = Vec2::new(unit_w.y, -unit_w.x);
                let u = unit_w * (combined_radius / tau - w_length);
                (direction, u)
            }
        } else {
            // Project onto the nearer tangent leg of the cone.
            let leg = (dist_sq - combined_radius_sq).max(0.0).sqrt();
            let direction = if rel_pos.det(w) > 0.0 {
                Vec2::new(
                    rel_pos.x * leg - rel_pos.y * combined_radius,
                    rel_pos.x * combined_radius + rel_pos.y * leg,
                ) / dist_sq
            } else {
                -Vec2::new(
                    rel_pos.x * leg + rel_pos.y * combined_radius,
                    -rel_pos.x * combined_radius + rel_pos.y * leg,
                ) / dist_sq
            };
            let dot2 = rel_vel.dot(direction);
            let u = direction * dot2 - rel_vel;
            (direction, u)
        }
    } else {
        // Overlapping: separation push over one physics step.
        let inv_dt = if dt > f32::EPSILON { 1.0 / dt } else { 0.0 };
        let w = rel_vel - rel_pos * inv_dt;
        let w_length = w.length();
        if w_length < f32::EPSILON {
            let tangent = degenerate_tangent(a.seed ^ b.seed);
            (tangent, tangent * (combined_radius * inv_dt))
        } else {
            let unit_w = w / w_length;
            let direction = Vec2::new(unit_w.y, -unit_w.x);
            let u = unit_w * (combined_radius * inv_dt - w_length);
            (direction, u)
        }
    };

    let reciprocity = a.reciprocity.clamp(0.0, 1.0);
    OrcaLine {
        point: a.vel + u * (0.5 * reciprocity),
        direction: direction.normalized(),
    }
}

/// Degenerate geometry (zero `w`, zero `relPos`) picks a pseudo-random
/// tangent seeded from the two agents' handles, so colocated agents with
/// identical velocity separate along different axes rather than one fixed
/// direction (§4.4 "Failure", §8 boundary case).
fn degenerate_tangent(seed: u64) -> Vec2 {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    Vec2::new(angle.cos(), angle.sin())
}

/// Seeds `pref_vel`, solves for the committed velocity subject to all ORCA
/// half-planes via the incremental 2D linear program (§4.4 item 4), and
/// clamps to `max_speed`.
pub fn solve(agent: &OrcaAgentSnapshot, lines: &[OrcaLine], config: &OrcaConfig) -> Vec2 {
    let mut result = Vec2::ZERO;
    let fail_index = linear_program2(lines, agent.max_speed, agent.pref_vel, false, &mut result);
    if fail_index < lines.len() {
        linear_program3(lines, 0, fail_index, agent.max_speed, &mut result);
    }
    result.clamp_length(agent.max_speed)
}
