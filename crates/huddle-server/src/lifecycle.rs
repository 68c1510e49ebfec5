//! Server lifecycle: owns the HTTP and hub tasks and stops them in order.
//!
//! Stopping first closes the listener and lets `axum::serve` drain in-flight
//! HTTP requests. Only then are the hubs cancelled, which closes every live
//! WebSocket connection.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Longest wait for each stage of [`Lifecycle::stop`].
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct Tasks {
    http: Option<JoinHandle<()>>,
    hubs: Vec<JoinHandle<()>>,
}

/// Where the server is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Accepting connections.
    Running,
    /// No longer accepting; hubs still up.
    Draining,
    /// Hubs cancelled.
    Stopped,
}

/// Owner of the server's background tasks.
pub struct Lifecycle {
    accept: CancellationToken,
    hubs: CancellationToken,
    tasks: Mutex<Tasks>,
    drain_timeout: Duration,
}

impl Lifecycle {
    /// Create a lifecycle whose stop stages each wait at most `drain_timeout`.
    pub fn new(drain_timeout: Duration) -> Self {
        Self {
            accept: CancellationToken::new(),
            hubs: CancellationToken::new(),
            tasks: Mutex::new(Tasks::default()),
            drain_timeout,
        }
    }

    /// Token a hub watches; cancelled in the last stop stage.
    pub fn hub_token(&self) -> CancellationToken {
        self.hubs.clone()
    }

    /// Token the HTTP server watches for graceful shutdown.
    pub fn accept_token(&self) -> CancellationToken {
        self.accept.clone()
    }

    /// Take ownership of a hub task.
    pub fn adopt_hub(&self, task: JoinHandle<()>) {
        self.tasks.lock().hubs.push(task);
    }

    /// Take ownership of the HTTP server task. A previous one is aborted.
    pub fn adopt_http(&self, task: JoinHandle<()>) {
        if let Some(previous) = self.tasks.lock().http.replace(task) {
            warn!("replacing running http task");
            previous.abort();
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        if self.hubs.is_cancelled() {
            Phase::Stopped
        } else if self.accept.is_cancelled() {
            Phase::Draining
        } else {
            Phase::Running
        }
    }

    /// Stop accepting, drain HTTP, then cancel the hubs and wait for them.
    ///
    /// A second call only re-cancels the tokens.
    pub async fn stop(&self) {
        let Tasks { http, hubs } = std::mem::take(&mut *self.tasks.lock());

        self.accept.cancel();
        if let Some(http) = http {
            if tokio::time::timeout(self.drain_timeout, http).await.is_err() {
                warn!(timeout = ?self.drain_timeout, "http server did not drain in time");
            }
        }

        self.hubs.cancel();
        info!(hubs = hubs.len(), "stopping hubs");
        if tokio::time::timeout(self.drain_timeout, futures::future::join_all(hubs))
            .await
            .is_err()
        {
            warn!(timeout = ?self.drain_timeout, "hubs did not stop in time");
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(DRAIN_TIMEOUT)
    }
}
