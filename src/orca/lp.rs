//! Incremental 2D linear program solving §4.4 item 4: "seed with preferred
//! velocity; iteratively project onto violated half-planes in
//! decreasing-urgency order; clamp to max_speed; converge within tolerance
//! or max_iterations".
//!
//! Translated from the RVO2-style `lp1`/`lp2`/`lp3` in
//! `examples/other_examples/5a35da50_kennerCreates-flume-sugar__src-engine-orca.rs.rs`
//! onto this crate's local `Vec2`/`OrcaLine` types.

use super::OrcaLine;
use crate::math::Vec2;

const EPS: f32 = 1e-5;

/// Solves the 1D sub-problem restricted to `lines[line_no]`, subject to all
/// earlier lines. Returns `false` if no feasible point exists on this line.
fn linear_program1(
    lines: &[OrcaLine],
    line_no: usize,
    radius: f32,
    opt_velocity: Vec2,
    direction_opt: bool,
    result: &mut Vec2,
) -> bool {
    let dot_product = lines[line_no].point.dot(lines[line_no].direction);
    let discriminant =
        dot_product * dot_product + radius * radius - lines[line_no].point.length_sq();
    if discriminant < 0.0 {
        return false;
    }
    let sqrt_discriminant = discriminant.sqrt();
    let mut t_left = -dot_product - sqrt_discriminant;
    let mut t_right = -dot_product + sqrt_discriminant;

    for i in 0..line_no {
        let denominator = lines[line_no].direction.det(lines[i].direction);
        let numerator = lines[i].direction.det(lines[line_no].point - lines[i].point);

        if denominator.abs() <= EPS {
            if numerator < 0.0 {
                return false;
            }
            continue;
        }

        let t = numerator / denominator;
        if denominator >= 0.0 {
            t_right = t_right.min(t);
        } else {
            t_left = t_left.max(t);
        }
        if t_left > t_right {
            return false;
        }
    }

    if direction_opt {
        if opt_velocity.dot(lines[line_no].direction) > 0.0 {
            *result = lines[line_no].point + lines[line_no].direction * t_right;
        } else {
            *result = lines[line_no].point + lines[line_no].direction * t_left;
        }
    } else {
        let t = lines[line_no].direction.dot(opt_velocity - lines[line_no].point);
        let t = t.clamp(t_left, t_right);
        *result = lines[line_no].point + lines[line_no].direction * t;
    }
    true
}

/// Iterates all constraint lines in order, re-solving with `linear_program1`
/// whenever the running result violates one. Returns `lines.len()` on full
/// success, or the index of the first line that could not be satisfied
/// (used as the starting point for `linear_program3`'s fallback).
pub fn linear_program2(
    lines: &[OrcaLine],
    radius: f32,
    opt_velocity: Vec2,
    direction_opt: bool,
    result: &mut Vec2,
) -> usize {
    if direction_opt {
        *result = opt_velocity * radius;
    } else if opt_velocity.length_sq() > radius * radius {
        *result = opt_velocity.normalized() * radius;
    } else {
        *result = opt_velocity;
    }

    for i in 0..lines.len() {
        if lines[i].direction.det(lines[i].point - *result) > 0.0 {
            let temp = *result;
            if !linear_program1(lines, i, radius, opt_velocity, direction_opt, result) {
                *result = temp;
                return i;
            }
        }
    }
    lines.len()
}

/// Infeasibility fallback: minimizes the maximum constraint violation depth
/// by re-running `linear_program2` against each offending line projected
/// into a reduced problem (§4.4's "convergence" clause when no single point
/// satisfies every half-plane).
pub fn linear_program3(lines: &[OrcaLine], num_obst_lines: usize, begin_line: usize, radius: f32, result: &mut Vec2) {
    let mut distance = 0.0f32;

    for i in begin_line..lines.len() {
        if lines[i].direction.det(lines[i].point - *result) > distance {
            let mut proj_lines: Vec<OrcaLine> = lines[..num_obst_lines].to_vec();

            for j in num_obst_lines..i {
                let determinant = lines[i].direction.det(lines[j].direction);
                let line_point = if determinant.abs() <= EPS {
                    if lines[i].direction.dot(lines[j].direction) > 0.0 {
                        continue;
                    }
                    (lines[i].point + lines[j].point) * 0.5
                } else {
                    lines[i].point
                        + lines[i].direction
                            * (lines[j].direction.det(lines[i].point - lines[j].point) / determinant)
                };
                let direction = (lines[j].direction - lines[i].direction).normalized();
                proj_lines.push(OrcaLine {
                    point: line_point,
                    direction,
                });
            }

            let temp_result = *result;
            let perp_opt = Vec2::new(-lines[i].direction.y, lines[i].direction.x);
            if linear_program2(&proj_lines, radius, perp_opt, true, result) < proj_lines.len() {
                *result = temp_result;
            }
            distance = lines[i].direction.det(lines[i].point - *result);
        }
    }
}
