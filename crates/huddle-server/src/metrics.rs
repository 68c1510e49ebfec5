//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup
/// before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket connections admitted total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket sessions (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Session lifetime in seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Connections closed during admission (counter, labels: code).
pub const WS_ADMISSION_REJECTED_TOTAL: &str = "ws_admission_rejected_total";
/// Broadcasts delivered to a non-empty arena (counter).
pub const HUB_BROADCASTS_TOTAL: &str = "hub_broadcasts_total";
/// Subscriptions torn down because their queue was full (counter).
pub const HUB_BACKPRESSURE_DROPS_TOTAL: &str = "hub_backpressure_drops_total";
/// Events handled successfully (counter, labels: event).
pub const EVENTS_DISPATCHED_TOTAL: &str = "events_dispatched_total";
/// Events dropped by authorization or the handler (counter, labels: event, reason).
pub const EVENTS_REJECTED_TOTAL: &str = "events_rejected_total";
/// Handler run time in seconds (histogram, labels: event).
pub const EVENT_HANDLER_DURATION_SECONDS: &str = "event_handler_duration_seconds";
