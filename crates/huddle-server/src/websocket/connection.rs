//! Per-socket outbound queue and close signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use huddle_core::close::CloseCode;
use huddle_core::ids::ConnectionId;
use huddle_core::wire::SocketEvent;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// One live WebSocket connection as seen by the hub and the session pumps.
///
/// Outbound frames go through a bounded queue drained by the egress pump.
/// Closing is a one-way signal observed by both pumps; the egress pump
/// answers it by flushing what is queued and sending the close frame.
pub struct Connection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Send side of the outbound queue.
    tx: mpsc::Sender<Arc<String>>,
    /// Cancelled once the connection should shut down.
    closed: CancellationToken,
    /// Application close code to send with the final close frame.
    close_code: Mutex<Option<CloseCode>>,
    /// When this connection was admitted.
    pub connected_at: Instant,
    /// Count of messages dropped because the queue was full or closed.
    dropped_messages: AtomicU64,
}

impl Connection {
    /// Create a connection around the send side of its outbound queue.
    pub fn new(tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id: ConnectionId::new(),
            tx,
            closed: CancellationToken::new(),
            close_code: Mutex::new(None),
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Enqueue a text frame without waiting.
    ///
    /// Returns `false` if the queue is full or closed, or the connection is
    /// already closing, and increments the dropped message counter.
    pub fn send(&self, message: Arc<String>) -> bool {
        if !self.closed.is_cancelled() && self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Encode and enqueue an event.
    pub fn send_event(&self, event: &SocketEvent) -> bool {
        match event.encode() {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                warn!(connection_id = %self.id, error = %e, "failed to encode event");
                false
            }
        }
    }

    /// Signal both pumps to stop. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Record `code` for the final close frame and signal closure.
    ///
    /// The first recorded code wins.
    pub fn close_with(&self, code: CloseCode) {
        {
            let mut slot = self.close_code.lock();
            if slot.is_none() {
                *slot = Some(code);
            }
        }
        self.close();
    }

    /// Whether closure has been signalled.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once closure has been signalled.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Close code recorded via [`Connection::close_with`], if any.
    pub fn close_code(&self) -> Option<CloseCode> {
        *self.close_code.lock()
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
