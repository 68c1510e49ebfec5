//! A realm is one arena kind served end to end: its hub, its event
//! registry, and the state service that owns its arenas.

use std::sync::Arc;

use huddle_core::arena::ArenaKind;
use huddle_core::events::EventRegistry;
use huddle_core::services::ArenaStateService;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::hub::Hub;

/// Everything needed to serve arenas of one kind.
#[derive(Clone)]
pub struct Realm {
    kind: ArenaKind,
    hub: Hub,
    registry: Arc<EventRegistry>,
    state: Arc<dyn ArenaStateService>,
}

impl Realm {
    /// Start the realm's hub and bundle it with `registry` and `state`.
    pub fn spawn(
        kind: ArenaKind,
        registry: Arc<EventRegistry>,
        state: Arc<dyn ArenaStateService>,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (hub, task) = Hub::spawn(kind.label(), shutdown);
        info!(kind = kind.label(), events = registry.len(), "realm started");
        let realm = Self {
            kind,
            hub,
            registry,
            state,
        };
        (realm, task)
    }

    /// Arena kind.
    pub fn kind(&self) -> ArenaKind {
        self.kind
    }

    /// Hub handle.
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Event registry.
    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Arena state service.
    pub fn state(&self) -> &dyn ArenaStateService {
        self.state.as_ref()
    }
}

/// The storyboard and poker realms.
#[derive(Clone)]
pub struct Realms {
    /// Storyboards.
    pub storyboard: Realm,
    /// Poker battles.
    pub poker: Realm,
}

impl Realms {
    /// Realm serving `kind`.
    pub fn get(&self, kind: ArenaKind) -> &Realm {
        match kind {
            ArenaKind::Storyboard => &self.storyboard,
            ArenaKind::Poker => &self.poker,
        }
    }

    /// Both realms.
    pub fn iter(&self) -> impl Iterator<Item = &Realm> {
        [&self.storyboard, &self.poker].into_iter()
    }
}
