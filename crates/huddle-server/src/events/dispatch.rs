//! Inbound socket frame dispatch.

use std::time::Instant;

use huddle_core::events::{EventContext, EventOutcome};
use huddle_core::ids::{ArenaId, UserId};
use huddle_core::wire::{InboundFrame, SocketEvent};
use metrics::{counter, histogram};
use tracing::{debug, warn};

use super::authorize;
use crate::metrics::{EVENTS_DISPATCHED_TOTAL, EVENTS_REJECTED_TOTAL, EVENT_HANDLER_DURATION_SECONDS};
use crate::realm::Realm;

/// What the ingress pump should do after one inbound frame.
#[derive(Debug, PartialEq)]
pub enum Dispatch {
    /// Broadcast this event to the arena.
    Broadcast(SocketEvent),
    /// Close the initiating connection.
    Close,
    /// Nothing to send; the frame was rejected or ignored.
    Dropped,
}

/// Decode, authorize, and run one inbound frame.
///
/// Rejections are logged and swallowed: the sender gets no reply and the
/// connection stays open.
pub async fn dispatch(realm: &Realm, arena_id: &ArenaId, user_id: &UserId, text: &str) -> Dispatch {
    let frame = match InboundFrame::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(arena_id = %arena_id, user_id = %user_id, error = %e, "malformed frame");
            return Dispatch::Dropped;
        }
    };

    let Some(entry) = realm.registry().get(&frame.event_type) else {
        debug!(arena_id = %arena_id, event_type = %frame.event_type, "unknown event type");
        return Dispatch::Dropped;
    };

    let ctx = EventContext::new(arena_id.clone(), user_id.clone());
    let event_label = frame.event_type.clone();

    if let Err(e) = authorize(realm, &ctx, entry).await {
        warn!(arena_id = %arena_id, user_id = %user_id, event_type = %frame.event_type, "owner-only event rejected");
        counter!(EVENTS_REJECTED_TOTAL, "event" => event_label, "reason" => e.kind()).increment(1);
        return Dispatch::Dropped;
    }

    let start = Instant::now();
    let result = entry.invoke(&ctx, &frame.value).await;
    histogram!(EVENT_HANDLER_DURATION_SECONDS, "event" => event_label.clone())
        .record(start.elapsed().as_secs_f64());

    match result {
        Ok(outcome) => {
            counter!(EVENTS_DISPATCHED_TOTAL, "event" => event_label).increment(1);
            match outcome {
                EventOutcome::Broadcast(event) => Dispatch::Broadcast(event),
                EventOutcome::Close => Dispatch::Close,
            }
        }
        Err(e) => {
            warn!(
                arena_id = %arena_id,
                user_id = %user_id,
                event_type = %frame.event_type,
                error = %e,
                "event handler failed"
            );
            counter!(EVENTS_REJECTED_TOTAL, "event" => event_label, "reason" => e.kind()).increment(1);
            Dispatch::Dropped
        }
    }
}
