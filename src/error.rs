//! Crate-level error kinds.
//!
//! Per the error handling design: no exception-style unwinding. Every public
//! operation returns a success/failure discriminator (`Option`, `bool`, or
//! `Result<_, SimError>`); the tick driver never aborts a tick because of one.
//! `SimError` exists for call sites that want a typed reason rather than a
//! bare `None`/`false`.

use bevy_ecs::entity::Entity;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SimError {
    /// Referenced entity has already been recycled or never existed.
    #[error("invalid handle: {0:?}")]
    InvalidHandle(Entity),

    /// Pathfinder found no route between the requested endpoints.
    #[error("unreachable")]
    Unreachable,

    /// The pathfinder's deferred request queue is at capacity; the oldest
    /// low-priority request was dropped to make room.
    #[error("pathfinder request queue full")]
    QueueFull,

    /// `TargetResolver::lock` failed because the target is already locked by
    /// a live attacker.
    #[error("lock contention")]
    LockContention,

    /// A spawn request referenced an agent kind absent from the agent config
    /// table. The spawn is skipped, not fatal.
    #[error("unknown agent kind: {0}")]
    ConfigMissing(u32),
}
