//! Simulation-wide timing resources (§4.10 Tick Driver).
//!
//! Grounded on the teacher's `performance.rs` for the `SimConfig`/`SimTick`
//! fixed-timestep resources; the teacher's LOD/sector/activity-flags content
//! (`SimLod`, `SectorId`, `ActivityFlags`, `SectorCombatData`) has no
//! counterpart in this spec and is dropped.

use bevy_ecs::prelude::*;

/// Configuration for the fixed-timestep tick driver (§4.10).
#[derive(Resource, Debug, Clone)]
pub struct SimConfig {
    /// Fixed timestep in seconds (e.g., 1/30 = 0.0333 for 30 Hz).
    pub fixed_timestep: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 30.0,
        }
    }
}

/// Global simulation tick counter, incremented once per fixed update.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

/// Elapsed simulation time in seconds, advanced once per fixed tick
/// alongside `SimTick`. Attack cooldowns (`last_attack_time +
/// attack_interval <= now`, §4.7) are compared against this, not the tick
/// count, since `attack_interval` is authored in seconds.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimClock(pub f32);

impl SimClock {
    pub fn advance(&mut self, dt: f32) {
        self.0 += dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_tick_increments_and_wraps() {
        let mut tick = SimTick(u64::MAX);
        tick.increment();
        assert_eq!(tick.0, 0);
    }

    #[test]
    fn sim_clock_accumulates_elapsed_time() {
        let mut clock = SimClock::default();
        clock.advance(0.5);
        clock.advance(0.25);
        assert!((clock.0 - 0.75).abs() < 1e-6);
    }
}
