//! Hub actor: the single owner of arena membership.
//!
//! Every register, unregister, and broadcast goes through one mailbox and
//! is applied by one task, so per-arena broadcast order is the order the
//! hub receives them. Delivery to each subscription is a non-blocking
//! enqueue; a subscription whose queue is full is torn down instead of
//! stalling the hub.

use std::collections::HashMap;
use std::sync::Arc;

use huddle_core::ids::{ArenaId, ConnectionId, UserId};
use huddle_core::wire::SocketEvent;
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::{HUB_BACKPRESSURE_DROPS_TOTAL, HUB_BROADCASTS_TOTAL};
use crate::websocket::connection::Connection;

/// Live binding of one connection to one arena for one user.
#[derive(Clone)]
pub struct Subscription {
    /// Arena the connection joined.
    pub arena_id: ArenaId,
    /// User behind the connection.
    pub user_id: UserId,
    /// The connection itself.
    pub connection: Arc<Connection>,
}

/// One registered subscription as reported by [`Hub::subscribers`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberInfo {
    /// Connection ID.
    pub connection_id: ConnectionId,
    /// User ID.
    pub user_id: UserId,
}

/// Registry size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Arenas with at least one subscription.
    pub arenas: usize,
    /// Total subscriptions.
    pub subscriptions: usize,
}

/// The hub task has stopped and can no longer accept commands.
#[derive(Debug, Error)]
#[error("hub has stopped")]
pub struct HubError;

enum HubCommand {
    Register(Subscription),
    Unregister {
        arena_id: ArenaId,
        connection_id: ConnectionId,
    },
    Broadcast {
        arena_id: ArenaId,
        message: Arc<String>,
    },
    Subscribers {
        arena_id: ArenaId,
        reply: oneshot::Sender<Vec<SubscriberInfo>>,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
}

/// Handle to a running hub. Cheap to clone.
#[derive(Clone)]
pub struct Hub {
    tx: mpsc::Sender<HubCommand>,
}

impl Hub {
    /// Mailbox depth.
    pub const MAILBOX_CAPACITY: usize = 1024;

    /// Spawn a hub task. It runs until `shutdown` is cancelled or every
    /// handle is dropped, then closes all remaining connections.
    pub fn spawn(name: &'static str, shutdown: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(Self::MAILBOX_CAPACITY);
        let task = tokio::spawn(run(name, rx, shutdown));
        (Self { tx }, task)
    }

    async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.tx.send(command).await.map_err(|_| HubError)
    }

    /// Add a subscription to its arena. Re-registering a connection replaces it.
    pub async fn register(&self, subscription: Subscription) -> Result<(), HubError> {
        self.send(HubCommand::Register(subscription)).await
    }

    /// Remove a subscription and close its connection. No-op if absent.
    pub async fn unregister(
        &self,
        arena_id: &ArenaId,
        connection_id: &ConnectionId,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Unregister {
            arena_id: arena_id.clone(),
            connection_id: connection_id.clone(),
        })
        .await
    }

    /// Deliver `event` to every subscription of `arena_id`.
    pub async fn broadcast(&self, arena_id: &ArenaId, event: &SocketEvent) -> Result<(), HubError> {
        let message = match event.encode() {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(arena_id = %arena_id, event_type = %event.event_type, error = %e, "failed to encode broadcast");
                return Ok(());
            }
        };
        self.send(HubCommand::Broadcast {
            arena_id: arena_id.clone(),
            message,
        })
        .await
    }

    /// Current subscriptions of `arena_id`.
    pub async fn subscribers(&self, arena_id: &ArenaId) -> Result<Vec<SubscriberInfo>, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Subscribers {
            arena_id: arena_id.clone(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| HubError)
    }

    /// Whether `arena_id` has at least one subscription.
    pub async fn has_subscribers(&self, arena_id: &ArenaId) -> Result<bool, HubError> {
        Ok(!self.subscribers(arena_id).await?.is_empty())
    }

    /// Arena and subscription counts.
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Stats { reply }).await?;
        rx.await.map_err(|_| HubError)
    }
}

async fn run(name: &'static str, mut rx: mpsc::Receiver<HubCommand>, shutdown: CancellationToken) {
    let mut registry = Registry::default();
    debug!(hub = name, "hub started");

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => registry.apply(command),
                None => break,
            },
        }
    }

    let stats = registry.stats();
    registry.close_all();
    info!(hub = name, arenas = stats.arenas, subscriptions = stats.subscriptions, "hub stopped");
}

/// The arena → subscriptions map. Only the hub task touches it.
#[derive(Default)]
struct Registry {
    arenas: HashMap<ArenaId, HashMap<ConnectionId, Subscription>>,
}

impl Registry {
    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(subscription) => self.register(subscription),
            HubCommand::Unregister {
                arena_id,
                connection_id,
            } => self.unregister(&arena_id, &connection_id),
            HubCommand::Broadcast { arena_id, message } => self.broadcast(&arena_id, &message),
            HubCommand::Subscribers { arena_id, reply } => {
                let _ = reply.send(self.subscribers(&arena_id));
            }
            HubCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    fn register(&mut self, subscription: Subscription) {
        debug!(
            arena_id = %subscription.arena_id,
            user_id = %subscription.user_id,
            connection_id = %subscription.connection.id,
            "subscription registered"
        );
        let _ = self
            .arenas
            .entry(subscription.arena_id.clone())
            .or_default()
            .insert(subscription.connection.id.clone(), subscription);
    }

    fn unregister(&mut self, arena_id: &ArenaId, connection_id: &ConnectionId) {
        let Some(subscriptions) = self.arenas.get_mut(arena_id) else {
            return;
        };
        if let Some(subscription) = subscriptions.remove(connection_id) {
            subscription.connection.close();
            debug!(arena_id = %arena_id, connection_id = %connection_id, "subscription unregistered");
        }
        if subscriptions.is_empty() {
            let _ = self.arenas.remove(arena_id);
        }
    }

    fn broadcast(&mut self, arena_id: &ArenaId, message: &Arc<String>) {
        let Some(subscriptions) = self.arenas.get_mut(arena_id) else {
            return;
        };
        counter!(HUB_BROADCASTS_TOTAL).increment(1);

        let slow: Vec<ConnectionId> = subscriptions
            .iter()
            .filter(|(_, sub)| !sub.connection.send(Arc::clone(message)))
            .map(|(id, _)| id.clone())
            .collect();

        for connection_id in slow {
            let Some(subscription) = subscriptions.remove(&connection_id) else {
                continue;
            };
            if subscription.connection.is_closed() {
                debug!(arena_id = %arena_id, connection_id = %connection_id, "pruned closed subscription");
            } else {
                warn!(
                    arena_id = %arena_id,
                    user_id = %subscription.user_id,
                    connection_id = %connection_id,
                    "outbound queue full, dropping slow subscriber"
                );
                counter!(HUB_BACKPRESSURE_DROPS_TOTAL).increment(1);
                subscription.connection.close();
            }
        }
        if subscriptions.is_empty() {
            let _ = self.arenas.remove(arena_id);
        }
    }

    fn subscribers(&self, arena_id: &ArenaId) -> Vec<SubscriberInfo> {
        self.arenas
            .get(arena_id)
            .map(|subs| {
                subs.values()
                    .map(|sub| SubscriberInfo {
                        connection_id: sub.connection.id.clone(),
                        user_id: sub.user_id.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn stats(&self) -> HubStats {
        HubStats {
            arenas: self.arenas.len(),
            subscriptions: self.arenas.values().map(HashMap::len).sum(),
        }
    }

    fn close_all(&mut self) {
        for (_, subscriptions) in self.arenas.drain() {
            for subscription in subscriptions.into_values() {
                subscription.connection.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(arena: &str, user: &str, capacity: usize) -> (Subscription, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let sub = Subscription {
            arena_id: arena.into(),
            user_id: user.into(),
            connection: Arc::new(Connection::new(tx)),
        };
        (sub, rx)
    }

    fn event(event_type: &str) -> SocketEvent {
        SocketEvent::new(event_type, "", "u1")
    }

    fn spawn() -> (Hub, CancellationToken, JoinHandle<()>) {
        let token = CancellationToken::new();
        let (hub, task) = Hub::spawn("test", token.clone());
        (hub, token, task)
    }

    fn event_type(raw: &str) -> String {
        let value: serde_json::Value = serde_json::from_str(raw).unwrap();
        value["type"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscription() {
        let (hub, _token, _task) = spawn();
        let (s1, mut rx1) = subscription("a1", "u1", 8);
        let (s2, mut rx2) = subscription("a1", "u2", 8);
        let (other, mut rx_other) = subscription("a2", "u3", 8);
        hub.register(s1).await.unwrap();
        hub.register(s2).await.unwrap();
        hub.register(other).await.unwrap();

        hub.broadcast(&"a1".into(), &event("goal_added")).await.unwrap();
        let stats = hub.stats().await.unwrap();

        assert_eq!(event_type(&rx1.recv().await.unwrap()), "goal_added");
        assert_eq!(event_type(&rx2.recv().await.unwrap()), "goal_added");
        assert!(rx_other.try_recv().is_err());
        assert_eq!(stats, HubStats { arenas: 2, subscriptions: 3 });
    }

    #[tokio::test]
    async fn broadcast_order_is_fifo() {
        let (hub, _token, _task) = spawn();
        let (s1, mut rx1) = subscription("a1", "u1", 8);
        hub.register(s1).await.unwrap();

        for name in ["first", "second", "third"] {
            hub.broadcast(&"a1".into(), &event(name)).await.unwrap();
        }
        let _ = hub.stats().await.unwrap();

        for name in ["first", "second", "third"] {
            assert_eq!(event_type(&rx1.recv().await.unwrap()), name);
        }
    }

    #[tokio::test]
    async fn unregister_absent_is_noop() {
        let (hub, _token, _task) = spawn();
        hub.unregister(&"nope".into(), &"c1".into()).await.unwrap();
        assert_eq!(hub.stats().await.unwrap(), HubStats::default());
    }

    #[tokio::test]
    async fn broadcast_to_empty_arena_is_noop() {
        let (hub, _token, _task) = spawn();
        hub.broadcast(&"empty".into(), &event("x")).await.unwrap();
        assert!(!hub.has_subscribers(&"empty".into()).await.unwrap());
    }

    #[tokio::test]
    async fn unregister_closes_connection() {
        let (hub, _token, _task) = spawn();
        let (s1, _rx1) = subscription("a1", "u1", 8);
        let conn = Arc::clone(&s1.connection);
        hub.register(s1).await.unwrap();
        assert!(hub.has_subscribers(&"a1".into()).await.unwrap());

        hub.unregister(&"a1".into(), &conn.id).await.unwrap();
        assert!(!hub.has_subscribers(&"a1".into()).await.unwrap());
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn slow_subscriber_is_dropped_without_affecting_others() {
        let (hub, _token, _task) = spawn();
        let (slow, _slow_rx) = subscription("a1", "slow", 1);
        let (fast, mut fast_rx) = subscription("a1", "fast", 8);
        let slow_conn = Arc::clone(&slow.connection);
        hub.register(slow).await.unwrap();
        hub.register(fast).await.unwrap();

        hub.broadcast(&"a1".into(), &event("one")).await.unwrap();
        hub.broadcast(&"a1".into(), &event("two")).await.unwrap();

        let subs = hub.subscribers(&"a1".into()).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].user_id.as_str(), "fast");
        assert!(slow_conn.is_closed());
        assert_eq!(event_type(&fast_rx.recv().await.unwrap()), "one");
        assert_eq!(event_type(&fast_rx.recv().await.unwrap()), "two");
    }

    #[tokio::test]
    async fn register_twice_is_a_set_add() {
        let (hub, _token, _task) = spawn();
        let (s1, _rx) = subscription("a1", "u1", 8);
        hub.register(s1.clone()).await.unwrap();
        hub.register(s1).await.unwrap();
        assert_eq!(hub.subscribers(&"a1".into()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_user_may_hold_multiple_subscriptions() {
        let (hub, _token, _task) = spawn();
        let (tab1, _rx1) = subscription("a1", "u1", 8);
        let (tab2, _rx2) = subscription("a1", "u1", 8);
        hub.register(tab1).await.unwrap();
        hub.register(tab2).await.unwrap();
        assert_eq!(hub.subscribers(&"a1".into()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn shutdown_closes_all_connections() {
        let (hub, token, task) = spawn();
        let (s1, _rx1) = subscription("a1", "u1", 8);
        let (s2, _rx2) = subscription("a2", "u2", 8);
        let conns = [Arc::clone(&s1.connection), Arc::clone(&s2.connection)];
        hub.register(s1).await.unwrap();
        hub.register(s2).await.unwrap();
        let _ = hub.stats().await.unwrap();

        token.cancel();
        task.await.unwrap();

        assert!(conns.iter().all(|c| c.is_closed()));
        assert!(hub.stats().await.is_err());
    }
}
