//! Event authorization, socket dispatch, and the API bridge.

pub mod bridge;
pub mod dispatch;

use huddle_core::errors::EventError;
use huddle_core::events::{EventContext, RegisteredEvent};
use tracing::debug;

use crate::realm::Realm;

/// Check the owner-only rule for `entry`.
///
/// Open events pass unconditionally. Owner-only events require the
/// state service to confirm the acting user as a facilitator; any failure
/// there, including a missing arena, is reported as unauthorized.
pub async fn authorize(realm: &Realm, ctx: &EventContext, entry: &RegisteredEvent) -> Result<(), EventError> {
    if !entry.owner_only() {
        return Ok(());
    }
    realm
        .state()
        .confirm_facilitator(&ctx.arena_id, &ctx.user_id)
        .await
        .map_err(|e| {
            debug!(arena_id = %ctx.arena_id, user_id = %ctx.user_id, error = %e, "facilitator check failed");
            EventError::Unauthorized
        })
}
