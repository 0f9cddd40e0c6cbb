//! ECS systems driving the tick (§4.10).
//!
//! Each module owns one Tick Driver step:
//!
//! | Step | System | Reads | Writes |
//! |------|--------|-------|--------|
//! | 3 | `agent_brain_system` | SpatialGrid, TargetResolver, FlowField | Intent, TargetLocks |
//! | 4 | `agent_state_machine_system`, `state_timer_system` | Intent, Health | AgentState, EventSchedule |
//! | 5 | `orca_step_system` | SpatialGrid, Intent, Velocity | Velocity |
//! | 6 | `scheduled_event_drain_system`, `projectile_step_system`, `movement_system` | EventSchedule, SpatialGrid | Health, Position, CoreEventBuffer |
//! | 7 | `target::target_sweep_system` (own throttled interval) | TargetMemory, TargetLocks | — |
//! | 8 | `Pool` recycle sweep (folded into `scheduled_event_drain_system`'s `AutoRecycle` handling) | Pool | Inactive |
//! | 9 | `clear_just_damaged_system` | JustDamaged | — |
//!
//! `movement_system`/`projectile_lifetime_system` apply the velocities ORCA
//! and projectile integration produced; `performance` holds the shared
//! `SimTick`/`SimClock`/`SimConfig` resources every other module reads.

pub mod brain;
pub mod combat;
pub mod movement;
pub mod orca;
pub mod performance;
pub mod serialization;
pub mod state_machine;

pub use brain::*;
pub use combat::*;
pub use movement::*;
pub use orca::*;
pub use performance::*;
pub use serialization::*;
pub use state_machine::*;
