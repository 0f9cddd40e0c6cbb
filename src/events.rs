//! Host → sim and sim → host event types (§6 "External interface").
//!
//! Grounded on the teacher's `api.rs`/`godot_bridge.rs` split: the teacher
//! pushes commands in from the host and drains a snapshot out; this crate
//! generalizes that into two explicit enums (`HostEvent` in, `CoreEvent`
//! out) plus a per-tick drain buffer, since the spec's host boundary is
//! richer than the teacher's single `Order` component.

use crate::components::{AgentKind, Intent};
use crate::faction::Faction;
use crate::math::Vec2;
use bevy_ecs::entity::Entity;
use bevy_ecs::system::Resource;
use serde::{Deserialize, Serialize};

/// Commands the host pushes into the sim for the next tick (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HostEvent {
    Spawn {
        kind: AgentKind,
        faction: Faction,
        pos: Vec2,
    },
    SetIntent {
        agent: Entity,
        intent: Intent,
    },
    ApplyDamage {
        target: Entity,
        amount: f32,
    },
    SetWalkable {
        pos: Vec2,
        walkable: bool,
    },
}

/// Observations the sim emits for the host to render/react to (§6). Drained
/// once per tick by the caller of `SimWorld::step`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum CoreEvent {
    AnimationRequest { agent: Entity, state: crate::components::AgentState },
    DamageDealt { attacker: Entity, target: Entity, amount: f32 },
    Death { agent: Entity },
    ProjectileSpawn { handle: Entity, pos: Vec2 },
    ProjectileDespawn { handle: Entity },
    PoolRecycle { handle: Entity, kind: AgentKind },
}

#[derive(Resource, Default)]
pub struct CoreEventBuffer {
    events: Vec<CoreEvent>,
}

impl CoreEventBuffer {
    pub fn push(&mut self, event: CoreEvent) {
        self.events.push(event);
    }

    /// Takes every event queued since the last drain, in emission order.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Pending host commands queued for the next `SimWorld::step` (§6). The
/// host appends via `SimWorld::push_event`; the tick driver drains it first
/// in its per-step ordering (§4.10 step 1).
#[derive(Resource, Default)]
pub struct HostEventQueue {
    events: Vec<HostEvent>,
}

impl HostEventQueue {
    pub fn push(&mut self, event: HostEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_buffer_in_order() {
        let mut buffer = CoreEventBuffer::default();
        buffer.push(CoreEvent::Death { agent: Entity::from_raw(1) });
        buffer.push(CoreEvent::Death { agent: Entity::from_raw(2) });
        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn host_queue_round_trips_in_fifo_order() {
        let mut queue = HostEventQueue::default();
        queue.push(HostEvent::SetWalkable { pos: Vec2::ZERO, walkable: false });
        queue.push(HostEvent::ApplyDamage { target: Entity::from_raw(1), amount: 5.0 });
        let drained = queue.drain();
        assert!(matches!(drained[0], HostEvent::SetWalkable { .. }));
        assert!(matches!(drained[1], HostEvent::ApplyDamage { .. }));
    }
}
