//! Active session: ingress and egress pumps for one admitted connection.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use huddle_core::arena::{Arena, User};
use huddle_core::close::CloseCode;
use huddle_core::ids::{ArenaId, UserId};
use huddle_core::wire::SocketEvent;
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{Span, debug, info, instrument, warn};

use super::connection::Connection;
use super::{Liveness, SEND_QUEUE_CAPACITY};
use crate::events::dispatch::{Dispatch, dispatch};
use crate::hub::Subscription;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::realm::Realm;

/// How the ingress pump ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Exit {
    /// Transport closed, errored, timed out, or the connection was closed elsewhere.
    Disconnected,
    /// A handler asked for the connection to be closed.
    Forced,
}

/// Run an admitted connection until it ends.
///
/// 1. Queues the `init` snapshot, registers with the hub, and announces
///    `user_joined` to the arena
/// 2. Runs the egress pump on its own task and the ingress pump inline
/// 3. On exit, removes the user from the arena, unregisters, announces
///    `user_left`, and lets egress flush and send the close frame
#[instrument(
    skip_all,
    fields(arena_id = %arena.id, user_id = %user.id, connection_id = tracing::field::Empty)
)]
pub async fn run_session(socket: WebSocket, realm: Realm, arena: Arena, user: User, liveness: Liveness) {
    let (tx, rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
    let connection = Arc::new(Connection::new(tx));
    let _ = Span::current().record("connection_id", tracing::field::display(&connection.id));
    let arena_id = arena.id.clone();
    let hub = realm.hub().clone();

    info!(kind = realm.kind().label(), "client joined");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // The snapshot is queued before registering so it precedes any broadcast.
    let _ = connection.send_event(&SocketEvent::init(&arena, &user.id));
    let subscription = Subscription {
        arena_id: arena_id.clone(),
        user_id: user.id.clone(),
        connection: Arc::clone(&connection),
    };
    if hub.register(subscription).await.is_err() {
        warn!("hub stopped before registration");
        connection.close();
    } else if let Err(e) = hub.broadcast(&arena_id, &SocketEvent::user_joined(&arena.users, &user.id)).await {
        warn!(error = %e, "failed to announce join");
    }

    let (sink, stream) = socket.split();
    let mut egress = tokio::spawn(egress(sink, rx, Arc::clone(&connection), liveness));

    let exit = ingress(stream, &realm, &arena_id, &user.id, &connection, liveness).await;

    let members = realm.state().remove_user(&arena_id, &user.id).await;
    if exit == Exit::Forced {
        connection.close_with(CloseCode::Abandoned);
    }
    let _ = hub.unregister(&arena_id, &connection.id).await;
    connection.close();
    if let Err(e) = hub.broadcast(&arena_id, &SocketEvent::user_left(&members, &user.id)).await {
        debug!(error = %e, "failed to announce leave");
    }

    if timeout(liveness.write_wait, &mut egress).await.is_err() {
        warn!("egress did not finish in time, aborting");
        egress.abort();
    }

    info!(?exit, dropped = connection.drop_count(), "client left");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
}

/// Read frames until the connection ends. The read deadline only moves on Pong.
async fn ingress(
    mut stream: SplitStream<WebSocket>,
    realm: &Realm,
    arena_id: &ArenaId,
    user_id: &UserId,
    connection: &Connection,
    liveness: Liveness,
) -> Exit {
    let mut deadline = Instant::now() + liveness.pong_wait;

    loop {
        let message = tokio::select! {
            () = connection.closed() => return Exit::Disconnected,
            next = timeout_at(deadline, stream.next()) => match next {
                Ok(Some(Ok(message))) => message,
                Ok(Some(Err(e))) => {
                    debug!(error = %e, "read error");
                    return Exit::Disconnected;
                }
                Ok(None) => return Exit::Disconnected,
                Err(_) => {
                    info!(timeout = ?liveness.pong_wait, "no pong before read deadline");
                    return Exit::Disconnected;
                }
            },
        };

        let dispatched = match message {
            Message::Text(text) => dispatch(realm, arena_id, user_id, text.as_str()).await,
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => dispatch(realm, arena_id, user_id, text).await,
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    continue;
                }
            },
            Message::Pong(_) => {
                deadline = Instant::now() + liveness.pong_wait;
                continue;
            }
            Message::Ping(_) => continue,
            Message::Close(_) => return Exit::Disconnected,
        };

        match dispatched {
            Dispatch::Broadcast(event) => {
                if let Err(e) = realm.hub().broadcast(arena_id, &event).await {
                    warn!(error = %e, "broadcast failed");
                    return Exit::Disconnected;
                }
            }
            Dispatch::Close => return Exit::Forced,
            Dispatch::Dropped => {}
        }
    }
}

/// Write queued frames and periodic pings until the connection closes, then
/// flush what is left and send the close frame.
async fn egress(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Arc<String>>,
    connection: Arc<Connection>,
    liveness: Liveness,
) {
    let mut ping = tokio::time::interval(liveness.ping_period);
    // Skip the immediate first tick
    let _ = ping.tick().await;

    loop {
        let message = tokio::select! {
            biased;
            () = connection.closed() => break,
            queued = rx.recv() => match queued {
                Some(text) => Message::Text(text.as_str().into()),
                None => break,
            },
            _ = ping.tick() => Message::Ping(vec![].into()),
        };
        if !write(&mut sink, message, &liveness).await {
            connection.close();
            return;
        }
    }

    while let Ok(text) = rx.try_recv() {
        if !write(&mut sink, Message::Text(text.as_str().into()), &liveness).await {
            return;
        }
    }

    let frame = connection.close_code().map(|code| CloseFrame {
        code: code.code(),
        reason: code.reason().into(),
    });
    let _ = write(&mut sink, Message::Close(frame), &liveness).await;
}

async fn write(sink: &mut SplitSink<WebSocket, Message>, message: Message, liveness: &Liveness) -> bool {
    match timeout(liveness.write_wait, sink.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(error = %e, "write failed");
            false
        }
        Err(_) => {
            debug!(timeout = ?liveness.write_wait, "write timed out");
            false
        }
    }
}
