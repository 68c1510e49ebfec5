//! WebSocket admission, session pumps, and the per-connection handle.

pub mod admission;
pub mod connection;
pub mod session;

use std::time::Duration;

use axum::extract::ws::WebSocket;
use huddle_core::arena::ArenaKind;
use huddle_core::ids::ArenaId;
use tracing::debug;

use crate::identity::Credential;
use crate::server::AppState;

use self::admission::{Admission, AdmissionPolicy};

/// Bound on a single outbound write.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// How long a connection may stay silent before it is considered dead.
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Interval between server-initiated Ping frames. Must be shorter than [`PONG_WAIT`].
pub const PING_PERIOD: Duration = Duration::from_secs(54);

/// Largest inbound frame accepted, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Depth of each connection's outbound queue.
pub const SEND_QUEUE_CAPACITY: usize = 256;

/// Liveness timings for one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Liveness {
    /// Bound on a single outbound write.
    pub write_wait: Duration,
    /// Read deadline, refreshed by every Pong.
    pub pong_wait: Duration,
    /// Ping interval.
    pub ping_period: Duration,
}

impl Default for Liveness {
    fn default() -> Self {
        Self {
            write_wait: WRITE_WAIT,
            pong_wait: PONG_WAIT,
            ping_period: PING_PERIOD,
        }
    }
}

/// Drive one upgraded socket from admission to close.
pub(crate) async fn serve(
    mut socket: WebSocket,
    state: AppState,
    kind: ArenaKind,
    arena_id: ArenaId,
    credential: Credential,
) {
    let realm = state.realms.get(kind).clone();
    let config = &state.config;
    let policy = AdmissionPolicy {
        join_code_max_attempts: config.join_code_max_attempts,
        liveness: config.liveness,
    };

    let admission = admission::admit(
        &mut socket,
        &realm,
        state.identity.as_ref(),
        &credential,
        &arena_id,
        &policy,
    )
    .await;

    match admission {
        Admission::Admitted { user, arena } => {
            session::run_session(socket, realm, arena, user, config.liveness).await;
        }
        Admission::Rejected(code) => admission::reject(socket, code, kind).await,
        Admission::Disconnected => {
            debug!(arena_id = %arena_id, kind = kind.label(), "connection left before admission");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_period_is_shorter_than_pong_wait() {
        let liveness = Liveness::default();
        assert!(liveness.ping_period < liveness.pong_wait);
        assert_eq!(liveness.write_wait, Duration::from_secs(10));
    }
}
