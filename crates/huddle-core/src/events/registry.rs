//! Event registry and bounded handler invocation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{EventContext, EventHandler, EventOutcome};
use crate::errors::EventError;

/// A handler together with its access rule.
#[derive(Clone)]
pub struct RegisteredEvent {
    handler: Arc<dyn EventHandler>,
    owner_only: bool,
}

impl RegisteredEvent {
    /// Whether only facilitators may trigger this event.
    pub fn owner_only(&self) -> bool {
        self.owner_only
    }

    /// Run the handler, bounded by [`EventRegistry::HANDLER_TIMEOUT`].
    pub async fn invoke(&self, ctx: &EventContext, value: &str) -> Result<EventOutcome, EventError> {
        tokio::time::timeout(EventRegistry::HANDLER_TIMEOUT, self.handler.handle(ctx, value))
            .await
            .map_err(|_| EventError::Timeout)?
    }
}

/// Registry mapping event-type names to handlers.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Clone, Default)]
pub struct EventRegistry {
    handlers: HashMap<String, RegisteredEvent>,
}

impl EventRegistry {
    /// Maximum time a single handler is allowed to run.
    pub const HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler any arena member may trigger.
    pub fn register(&mut self, event_type: &str, handler: impl EventHandler + 'static) {
        self.insert(event_type, Arc::new(handler), false);
    }

    /// Register a handler only facilitators may trigger.
    pub fn register_owner_only(&mut self, event_type: &str, handler: impl EventHandler + 'static) {
        self.insert(event_type, Arc::new(handler), true);
    }

    /// Register an already shared handler.
    pub fn insert(&mut self, event_type: &str, handler: Arc<dyn EventHandler>, owner_only: bool) {
        let _ = self.handlers.insert(
            event_type.to_owned(),
            RegisteredEvent {
                handler,
                owner_only,
            },
        );
    }

    /// Look up the handler for `event_type`.
    pub fn get(&self, event_type: &str) -> Option<&RegisteredEvent> {
        self.handlers.get(event_type)
    }

    /// Whether `event_type` requires the caller to be a facilitator.
    pub fn is_owner_only(&self, event_type: &str) -> bool {
        self.handlers.get(event_type).is_some_and(RegisteredEvent::owner_only)
    }

    /// Number of registered events.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no events are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::SocketEvent;
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    struct EchoHandler;

    #[async_trait]
    impl EventHandler for EchoHandler {
        async fn handle(&self, ctx: &EventContext, value: &str) -> Result<EventOutcome, EventError> {
            Ok(EventOutcome::Broadcast(SocketEvent::new(
                "echo",
                value,
                ctx.user_id.as_str(),
            )))
        }
    }

    struct SlowHandler;

    #[async_trait]
    impl EventHandler for SlowHandler {
        async fn handle(&self, _ctx: &EventContext, _value: &str) -> Result<EventOutcome, EventError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(EventOutcome::Close)
        }
    }

    fn ctx() -> EventContext {
        EventContext::new("a1".into(), "u1".into())
    }

    #[tokio::test]
    async fn register_and_invoke() {
        let mut reg = EventRegistry::new();
        reg.register("echo", EchoHandler);

        let outcome = reg.get("echo").unwrap().invoke(&ctx(), "hi").await.unwrap();
        assert_matches!(outcome, EventOutcome::Broadcast(ev) if ev.value == "hi" && ev.user_id == "u1");
    }

    #[test]
    fn owner_only_marking() {
        let mut reg = EventRegistry::new();
        reg.register("vote", EchoHandler);
        reg.register_owner_only("concede_battle", EchoHandler);

        assert!(!reg.is_owner_only("vote"));
        assert!(reg.is_owner_only("concede_battle"));
        assert!(!reg.is_owner_only("unknown"));
    }

    #[test]
    fn unknown_event_has_no_handler() {
        let reg = EventRegistry::new();
        assert!(reg.get("nope").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn len_counts_distinct_events() {
        let mut reg = EventRegistry::new();
        reg.register("b_event", EchoHandler);
        reg.register("a_event", EchoHandler);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn register_overwrites_previous() {
        let mut reg = EventRegistry::new();
        reg.register_owner_only("edit", EchoHandler);
        reg.register("edit", EchoHandler);
        assert!(!reg.is_owner_only("edit"));
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out() {
        let mut reg = EventRegistry::new();
        reg.register("slow", SlowHandler);

        let result = reg.get("slow").unwrap().invoke(&ctx(), "").await;
        assert_matches!(result, Err(EventError::Timeout));
    }
}
