//! `HuddleServer`: axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use huddle_core::arena::ArenaKind;
use huddle_core::events::EventRegistry;
use huddle_core::services::{ArenaStateService, IdentityResolver};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::hub::HubStats;
use crate::identity::Credential;
use crate::lifecycle::{Lifecycle, Phase};
use crate::realm::{Realm, Realms};
use crate::websocket::{self, MAX_MESSAGE_SIZE};

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Storyboard and poker realms.
    pub realms: Realms,
    /// Identity resolver.
    pub identity: Arc<dyn IdentityResolver>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Wall-clock start time.
    pub started_at: DateTime<Utc>,
    /// Prometheus handle for `/metrics`.
    pub metrics: PrometheusHandle,
}

/// Event registry and state service backing one realm.
pub struct RealmSetup {
    /// Event handlers.
    pub registry: EventRegistry,
    /// Arena state service.
    pub state: Arc<dyn ArenaStateService>,
}

/// The huddle server.
pub struct HuddleServer {
    state: AppState,
    lifecycle: Lifecycle,
}

impl HuddleServer {
    /// Create a server and start one hub per realm.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        config: ServerConfig,
        identity: Arc<dyn IdentityResolver>,
        storyboard: RealmSetup,
        poker: RealmSetup,
        metrics: PrometheusHandle,
    ) -> Self {
        let lifecycle = Lifecycle::default();
        let spawn = |kind, setup: RealmSetup| {
            let (realm, task) = Realm::spawn(kind, Arc::new(setup.registry), setup.state, lifecycle.hub_token());
            lifecycle.adopt_hub(task);
            realm
        };
        let storyboard = spawn(ArenaKind::Storyboard, storyboard);
        let poker = spawn(ArenaKind::Poker, poker);

        let state = AppState {
            realms: Realms { storyboard, poker },
            identity,
            config: Arc::new(config),
            start_time: Instant::now(),
            started_at: Utc::now(),
            metrics,
        };
        Self { state, lifecycle }
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/api/storyboard/{storyboard_id}", get(storyboard_ws))
            .route("/api/arena/{battle_id}", get(battle_ws))
            .route("/api/storyboards/{storyboard_id}", delete(api::concede_storyboard))
            .route("/api/battles/{battle_id}/plans", post(api::add_plan))
            .route("/api/battles/{battle_id}", delete(api::concede_battle))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind to the configured address and serve in the background until
    /// [`shutdown`](Self::shutdown).
    ///
    /// Returns the bound address (useful with port `0`).
    pub async fn listen(&self) -> std::io::Result<SocketAddr> {
        let listener = tokio::net::TcpListener::bind(self.state.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.lifecycle.accept_token();

        info!(%addr, "huddle server listening");

        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(token.cancelled_owned());
            if let Err(e) = server.await {
                warn!(error = %e, "server error");
            }
        });
        self.lifecycle.adopt_http(handle);
        Ok(addr)
    }

    /// Stop accepting connections, drain HTTP, then stop the hubs and
    /// close every live connection.
    pub async fn shutdown(&self) {
        self.lifecycle.stop().await;
    }

    /// Shared handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Realm serving `kind`.
    pub fn realm(&self, kind: ArenaKind) -> &Realm {
        self.state.realms.get(kind)
    }
}

/// Sum hub stats over every realm. Stopped hubs count as empty.
async fn hub_totals(realms: &Realms) -> HubStats {
    let mut total = HubStats::default();
    for realm in realms.iter() {
        if let Ok(stats) = realm.hub().stats().await {
            total.arenas += stats.arenas;
            total.subscriptions += stats.subscriptions;
        }
    }
    total
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let totals = hub_totals(&state.realms).await;
    Json(health::health_check(
        state.start_time,
        state.started_at,
        totals.subscriptions,
        totals.arenas,
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    crate::metrics::render(&state.metrics)
}

/// GET /api/storyboard/{storyboard_id}
async fn storyboard_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(storyboard_id): Path<String>,
    jar: CookieJar,
) -> Response {
    upgrade(ws, state, ArenaKind::Storyboard, storyboard_id, &jar)
}

/// GET /api/arena/{battle_id}
async fn battle_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(battle_id): Path<String>,
    jar: CookieJar,
) -> Response {
    upgrade(ws, state, ArenaKind::Poker, battle_id, &jar)
}

fn upgrade(ws: WebSocketUpgrade, state: AppState, kind: ArenaKind, arena_id: String, jar: &CookieJar) -> Response {
    let credential = Credential::from_jar(jar, &state.config.session_cookie, &state.config.guest_cookie);
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| websocket::serve(socket, state, kind, arena_id.into(), credential))
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    use crate::testutil::{MockArenaState, MockIdentity};

    fn setup() -> RealmSetup {
        RealmSetup {
            registry: EventRegistry::new(),
            state: Arc::new(MockArenaState::new()),
        }
    }

    fn make_server() -> HuddleServer {
        HuddleServer::new(
            ServerConfig::default(),
            Arc::new(MockIdentity::new()),
            setup(),
            setup(),
            PrometheusBuilder::new().build_recorder().handle(),
        )
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    #[tokio::test]
    async fn server_with_default_config() {
        let server = make_server();
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 0);
        assert_eq!(server.realm(ArenaKind::Poker).kind(), ArenaKind::Poker);
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server();
        let (status, body) = get_json(server.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["arenas"], 0);
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_ok() {
        let server = make_server();
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let req = Request::builder().uri("/nonexistent").body(Body::empty()).unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn websocket_route_requires_upgrade() {
        let server = make_server();
        let req = Request::builder()
            .uri("/api/arena/b1")
            .body(Body::empty())
            .unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn rest_without_cookie_is_401() {
        let server = make_server();
        let req = Request::builder()
            .method("DELETE")
            .uri("/api/battles/b1")
            .body(Body::empty())
            .unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn listen_then_shutdown_stops_http_and_hubs() {
        let server = make_server();
        let addr = server.listen().await.unwrap();
        assert_eq!(server.phase(), Phase::Running);

        server.shutdown().await;
        assert_eq!(server.phase(), Phase::Stopped);
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
        assert!(server.realm(ArenaKind::Poker).hub().stats().await.is_err());
    }

    #[tokio::test]
    async fn shutdown_stops_hubs() {
        let server = make_server();
        server.shutdown().await;
        assert_eq!(server.phase(), Phase::Stopped);
        assert!(server.realm(ArenaKind::Storyboard).hub().stats().await.is_err());
    }
}
