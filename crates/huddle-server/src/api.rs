//! REST endpoints routed through the API bridge.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use huddle_core::arena::ArenaKind;
use huddle_core::errors::{EventError, StateError};
use huddle_core::ids::ArenaId;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::events::bridge::api_event;
use crate::identity::{self, Credential};
use crate::server::AppState;

/// Response envelope shared by every REST endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded.
    pub success: bool,
    /// Payload on success.
    pub data: Option<T>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse<()> {
    /// Success without a payload.
    pub fn empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    /// Failure with a message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// REST failure, mapped onto an HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid credential.
    #[error("unauthorized")]
    Unauthorized,
    /// Caller is not allowed to run this operation.
    #[error("forbidden")]
    Forbidden,
    /// Arena (or a referenced entity) does not exist.
    #[error("not found")]
    NotFound,
    /// The request value was rejected.
    #[error("{0}")]
    BadRequest(String),
    /// Anything else.
    #[error("internal error")]
    Internal,
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NotFound => Self::NotFound,
            StateError::Unauthorized | StateError::NotFacilitator => Self::Forbidden,
            StateError::Invalid(message) => Self::BadRequest(message),
            other => {
                warn!(error = %other, "state service failure");
                Self::Internal
            }
        }
    }
}

impl From<EventError> for ApiError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::Unauthorized => Self::Forbidden,
            EventError::InvalidValue { message } => Self::BadRequest(message),
            EventError::State(state) => state.into(),
            EventError::Timeout => {
                warn!("api event timed out");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ApiResponse::failure(self.to_string()))).into_response()
    }
}

type ApiResult = Result<Json<ApiResponse<()>>, ApiError>;

/// DELETE /api/storyboards/{storyboard_id}
pub async fn concede_storyboard(
    State(state): State<AppState>,
    Path(storyboard_id): Path<String>,
    jar: CookieJar,
) -> ApiResult {
    run_event(&state, &jar, ArenaKind::Storyboard, storyboard_id.into(), "concede_storyboard", "").await
}

/// POST /api/battles/{battle_id}/plans
///
/// The request body is handed to the `add_plan` handler verbatim.
pub async fn add_plan(
    State(state): State<AppState>,
    Path(battle_id): Path<String>,
    jar: CookieJar,
    body: String,
) -> ApiResult {
    run_event(&state, &jar, ArenaKind::Poker, battle_id.into(), "add_plan", &body).await
}

/// DELETE /api/battles/{battle_id}
pub async fn concede_battle(
    State(state): State<AppState>,
    Path(battle_id): Path<String>,
    jar: CookieJar,
) -> ApiResult {
    run_event(&state, &jar, ArenaKind::Poker, battle_id.into(), "concede_battle", "").await
}

async fn run_event(
    state: &AppState,
    jar: &CookieJar,
    kind: ArenaKind,
    arena_id: ArenaId,
    event_type: &str,
    value: &str,
) -> ApiResult {
    let config = &state.config;
    let credential = Credential::from_jar(jar, &config.session_cookie, &config.guest_cookie);
    let user = identity::resolve(state.identity.as_ref(), &credential)
        .await
        .map_err(|_| ApiError::Unauthorized)?;

    let realm = state.realms.get(kind);
    let _ = realm.state().get_arena(&arena_id, &user.id).await?;
    api_event(realm, &arena_id, &user.id, event_type, value).await?;

    info!(arena_id = %arena_id, user_id = %user.id, event_type, "api event applied");
    Ok(Json(ApiResponse::empty()))
}
