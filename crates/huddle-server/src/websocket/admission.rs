//! Admission: identity, arena lookup, membership status, and the join-code gate.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use huddle_core::arena::{Arena, ArenaKind, User};
use huddle_core::close::CloseCode;
use huddle_core::errors::StateError;
use huddle_core::ids::{ArenaId, UserId};
use huddle_core::services::IdentityResolver;
use huddle_core::wire::{InboundFrame, SocketEvent};
use metrics::counter;
use tokio::time::{Instant, interval_at, timeout, timeout_at};
use tracing::{debug, info, warn};

use super::Liveness;
use crate::identity::{self, Credential};
use crate::metrics::WS_ADMISSION_REJECTED_TOTAL;
use crate::realm::Realm;

/// Limits applied while a connection waits in the join-code gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// Wrong submissions allowed before closing with 4001. Zero means unlimited.
    pub join_code_max_attempts: u32,
    /// Ping cadence and read deadline while gated, same as an admitted connection.
    pub liveness: Liveness,
}

/// Result of admitting one connection.
#[derive(Debug)]
pub enum Admission {
    /// The user is now an active member; `arena.users` is the refreshed member list.
    Admitted {
        /// Resolved user.
        user: User,
        /// Arena snapshot to send as `init`.
        arena: Arena,
    },
    /// Close the socket with this code.
    Rejected(CloseCode),
    /// The client went away (or went silent) before admission finished.
    Disconnected,
}

/// What to do with a resolved user before adding them to the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Admit without a join code.
    Proceed,
    /// Require the join code first.
    JoinCode,
    /// Close with this code.
    Reject(CloseCode),
}

/// Map a membership status to a gate decision.
///
/// Known members skip the gate. Users who never joined must present the
/// join code when one is set.
pub fn gate_decision(status: Result<(), StateError>, gated: bool) -> GateDecision {
    match status {
        Ok(()) => GateDecision::Proceed,
        Err(StateError::NotMember) if gated => GateDecision::JoinCode,
        Err(StateError::NotMember) => GateDecision::Proceed,
        Err(StateError::DuplicateSession) => GateDecision::Reject(CloseCode::DuplicateSession),
        Err(_) => GateDecision::Reject(CloseCode::Internal),
    }
}

/// Map an arena lookup failure to a close code.
pub fn lookup_failure(err: &StateError) -> CloseCode {
    match err {
        StateError::NotFound => CloseCode::NotFound,
        _ => CloseCode::Internal,
    }
}

/// Run admission for an upgraded socket.
pub async fn admit(
    socket: &mut WebSocket,
    realm: &Realm,
    resolver: &dyn IdentityResolver,
    credential: &Credential,
    arena_id: &ArenaId,
    policy: &AdmissionPolicy,
) -> Admission {
    let user = match identity::resolve(resolver, credential).await {
        Ok(user) => user,
        Err(_) => return Admission::Rejected(CloseCode::Unauthorized),
    };

    let state = realm.state();
    let mut arena = match state.get_arena(arena_id, &user.id).await {
        Ok(arena) => arena,
        Err(e) => {
            let code = lookup_failure(&e);
            if code == CloseCode::Internal {
                warn!(arena_id = %arena_id, user_id = %user.id, error = %e, "arena lookup failed");
            }
            return Admission::Rejected(code);
        }
    };

    let status = state.get_active_status(arena_id, &user.id).await;
    if let Err(e @ (StateError::Internal(_) | StateError::Invalid(_))) = &status {
        warn!(arena_id = %arena_id, user_id = %user.id, error = %e, "membership lookup failed");
    }

    match gate_decision(status, arena.is_gated()) {
        GateDecision::Proceed => {}
        GateDecision::Reject(code) => return Admission::Rejected(code),
        GateDecision::JoinCode => {
            match join_code_gate(socket, realm.kind(), &arena.join_code, &user.id, policy).await {
                GateOutcome::Passed => {}
                GateOutcome::Exhausted => return Admission::Rejected(CloseCode::Unauthorized),
                GateOutcome::Disconnected => return Admission::Disconnected,
            }
        }
    }

    match state.add_user(arena_id, &user.id).await {
        Ok(members) => {
            arena.users = members;
            Admission::Admitted { user, arena }
        }
        Err(e) => {
            warn!(arena_id = %arena_id, user_id = %user.id, error = %e, "failed to add user to arena");
            Admission::Rejected(CloseCode::Internal)
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum GateOutcome {
    Passed,
    Exhausted,
    Disconnected,
}

/// What woke the gate loop.
enum GateRead {
    PingDue,
    Frame(Message),
}

/// Hold the connection until it submits the join code.
///
/// Only frames of the realm's auth event type are considered; anything
/// else is ignored. The gated peer is pinged like an admitted one, and
/// only a Pong moves its read deadline.
async fn join_code_gate(
    socket: &mut WebSocket,
    kind: ArenaKind,
    join_code: &str,
    user_id: &UserId,
    policy: &AdmissionPolicy,
) -> GateOutcome {
    let liveness = policy.liveness;
    if !send_notice(socket, &SocketEvent::join_code_required(user_id), liveness.write_wait).await {
        return GateOutcome::Disconnected;
    }

    let mut deadline = Instant::now() + liveness.pong_wait;
    let mut ping = interval_at(Instant::now() + liveness.ping_period, liveness.ping_period);
    let mut attempts: u32 = 0;
    loop {
        let read = tokio::select! {
            _ = ping.tick() => GateRead::PingDue,
            next = timeout_at(deadline, socket.recv()) => match next {
                Ok(Some(Ok(message))) => GateRead::Frame(message),
                Ok(Some(Err(_)) | None) => return GateOutcome::Disconnected,
                Err(_) => {
                    debug!(user_id = %user_id, timeout = ?liveness.pong_wait, "no pong in join code gate");
                    return GateOutcome::Disconnected;
                }
            },
        };

        let message = match read {
            GateRead::PingDue => {
                if !send(socket, Message::Ping(vec![].into()), liveness.write_wait).await {
                    return GateOutcome::Disconnected;
                }
                continue;
            }
            GateRead::Frame(message) => message,
        };

        let decoded = match &message {
            Message::Text(text) => InboundFrame::decode(text.as_str()),
            Message::Binary(data) => match std::str::from_utf8(data) {
                Ok(text) => InboundFrame::decode(text),
                Err(_) => {
                    debug!(user_id = %user_id, len = data.len(), "ignoring non-UTF8 binary frame in join code gate");
                    continue;
                }
            },
            Message::Pong(_) => {
                deadline = Instant::now() + liveness.pong_wait;
                continue;
            }
            Message::Ping(_) => continue,
            Message::Close(_) => return GateOutcome::Disconnected,
        };
        let Ok(frame) = decoded else {
            debug!(user_id = %user_id, "malformed frame in join code gate");
            continue;
        };
        if frame.event_type != kind.auth_event() {
            continue;
        }
        if frame.value == join_code {
            return GateOutcome::Passed;
        }

        attempts = attempts.saturating_add(1);
        info!(user_id = %user_id, attempts, "incorrect join code");
        if !send_notice(socket, &SocketEvent::join_code_incorrect(user_id), liveness.write_wait).await {
            return GateOutcome::Disconnected;
        }
        if policy.join_code_max_attempts > 0 && attempts >= policy.join_code_max_attempts {
            return GateOutcome::Exhausted;
        }
    }
}

async fn send_notice(socket: &mut WebSocket, event: &SocketEvent, write_wait: Duration) -> bool {
    let Ok(json) = event.encode() else {
        return false;
    };
    send(socket, Message::Text(json.into()), write_wait).await
}

async fn send(socket: &mut WebSocket, message: Message, write_wait: Duration) -> bool {
    matches!(timeout(write_wait, socket.send(message)).await, Ok(Ok(())))
}

/// Close a socket that failed admission.
pub async fn reject(mut socket: WebSocket, code: CloseCode, kind: ArenaKind) {
    info!(code = code.code(), reason = code.reason(), kind = kind.label(), "connection rejected");
    counter!(WS_ADMISSION_REJECTED_TOTAL, "code" => code.code().to_string()).increment(1);
    let frame = CloseFrame {
        code: code.code(),
        reason: code.reason().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}
