//! API bridge: run an arena event on behalf of a REST call.

use std::time::Instant;

use huddle_core::errors::EventError;
use huddle_core::events::{EventContext, EventOutcome};
use huddle_core::ids::{ArenaId, UserId};
use metrics::{counter, histogram};
use tracing::{debug, warn};

use super::authorize;
use crate::metrics::{EVENTS_DISPATCHED_TOTAL, EVENTS_REJECTED_TOTAL, EVENT_HANDLER_DURATION_SECONDS};
use crate::realm::Realm;

/// Run `event_type` against `arena_id` as `user_id`.
///
/// Owner-only events are checked first. A successful broadcast outcome is
/// fanned out only if the arena currently has live subscriptions; a close
/// outcome has no connection to close and is ignored. Unknown event types
/// succeed without doing anything.
pub async fn api_event(
    realm: &Realm,
    arena_id: &ArenaId,
    user_id: &UserId,
    event_type: &str,
    value: &str,
) -> Result<(), EventError> {
    let Some(entry) = realm.registry().get(event_type) else {
        debug!(arena_id = %arena_id, event_type, "api event has no handler");
        return Ok(());
    };

    let ctx = EventContext::new(arena_id.clone(), user_id.clone());
    if let Err(e) = authorize(realm, &ctx, entry).await {
        counter!(EVENTS_REJECTED_TOTAL, "event" => event_type.to_owned(), "reason" => e.kind()).increment(1);
        return Err(e);
    }

    let start = Instant::now();
    let result = entry.invoke(&ctx, value).await;
    histogram!(EVENT_HANDLER_DURATION_SECONDS, "event" => event_type.to_owned())
        .record(start.elapsed().as_secs_f64());

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            counter!(EVENTS_REJECTED_TOTAL, "event" => event_type.to_owned(), "reason" => e.kind()).increment(1);
            return Err(e);
        }
    };
    counter!(EVENTS_DISPATCHED_TOTAL, "event" => event_type.to_owned()).increment(1);

    if let EventOutcome::Broadcast(event) = outcome {
        let hub = realm.hub();
        match hub.has_subscribers(arena_id).await {
            Ok(true) => {
                if let Err(e) = hub.broadcast(arena_id, &event).await {
                    warn!(arena_id = %arena_id, error = %e, "api broadcast failed");
                }
            }
            Ok(false) => debug!(arena_id = %arena_id, event_type, "no live subscriptions, skipping broadcast"),
            Err(e) => warn!(arena_id = %arena_id, error = %e, "api broadcast failed"),
        }
    }
    Ok(())
}
