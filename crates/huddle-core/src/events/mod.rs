//! Arena event handlers and their registry.
//!
//! A handler validates and applies one state-changing operation against the
//! Arena State Service and returns the payload to broadcast to the arena.

pub mod registry;

use async_trait::async_trait;

use crate::errors::EventError;
use crate::ids::{ArenaId, UserId};
use crate::wire::SocketEvent;

pub use registry::{EventRegistry, RegisteredEvent};

/// Per-invocation context handed to a handler.
#[derive(Clone, Debug)]
pub struct EventContext {
    /// Target arena.
    pub arena_id: ArenaId,
    /// Acting user.
    pub user_id: UserId,
}

impl EventContext {
    /// Context for `user_id` acting on `arena_id`.
    pub fn new(arena_id: ArenaId, user_id: UserId) -> Self {
        Self { arena_id, user_id }
    }
}

/// Successful handler result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    /// Broadcast this event to every subscription of the arena.
    Broadcast(SocketEvent),
    /// Force the initiating connection closed; nothing is broadcast for the
    /// event itself (the leave sequence still announces `user_left`).
    Close,
}

/// Trait implemented by every arena event handler.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Apply the event carried by `value`.
    async fn handle(&self, ctx: &EventContext, value: &str) -> Result<EventOutcome, EventError>;
}
