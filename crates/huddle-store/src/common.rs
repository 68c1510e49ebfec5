//! Handlers shared by storyboards and poker battles.

use huddle_core::errors::{EventError, StateError};
use huddle_core::events::{EventContext, EventOutcome};
use huddle_core::ids::UserId;
use huddle_core::wire::SocketEvent;
use serde::Deserialize;

use crate::memory::Txn;

/// Broadcast after the facilitator list changes.
pub const FACILITATORS_UPDATED: &str = "facilitators_updated";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FacilitatorValue {
    user_id: UserId,
}

/// `facilitator_add`: value `{"userId"}`; the user must exist.
pub(crate) fn facilitator_add(
    txn: Txn<'_>,
    ctx: &EventContext,
    value: &str,
) -> Result<EventOutcome, EventError> {
    let Txn { arena, users, .. } = txn;
    let FacilitatorValue { user_id } = serde_json::from_str(value)?;
    if !users.contains_key(&user_id) {
        return Err(StateError::NotFound.into());
    }
    if !arena.facilitators.contains(&user_id) {
        arena.facilitators.push(user_id);
    }
    Ok(facilitators_updated(&arena.facilitators, ctx))
}

/// `facilitator_remove`: value `{"userId"}`; the last facilitator stays.
pub(crate) fn facilitator_remove(
    txn: Txn<'_>,
    ctx: &EventContext,
    value: &str,
) -> Result<EventOutcome, EventError> {
    let FacilitatorValue { user_id } = serde_json::from_str(value)?;
    let Txn { arena, .. } = txn;
    let facilitators = &mut arena.facilitators;
    if !facilitators.contains(&user_id) {
        return Err(StateError::NotFound.into());
    }
    if facilitators.len() == 1 {
        return Err(StateError::Invalid("an arena needs at least one facilitator".into()).into());
    }
    facilitators.retain(|id| id != &user_id);
    Ok(facilitators_updated(facilitators, ctx))
}

fn facilitators_updated(facilitators: &[UserId], ctx: &EventContext) -> EventOutcome {
    EventOutcome::Broadcast(SocketEvent::with_json(
        FACILITATORS_UPDATED,
        facilitators,
        ctx.user_id.as_str(),
    ))
}

/// `concede_*`: delete the arena and tell everyone still connected.
pub(crate) fn concede(
    txn: Txn<'_>,
    ctx: &EventContext,
    _value: &str,
) -> Result<EventOutcome, EventError> {
    let Txn { arena, .. } = txn;
    arena.conceded = true;
    let event_type = format!("{}_conceded", arena.kind().label());
    Ok(EventOutcome::Broadcast(SocketEvent::new(
        event_type,
        "",
        ctx.user_id.as_str(),
    )))
}

/// `abandon_*`: mark the caller as having left and force their connection
/// closed. Other live sessions of the same user keep them listed.
pub(crate) fn abandon(
    txn: Txn<'_>,
    ctx: &EventContext,
    _value: &str,
) -> Result<EventOutcome, EventError> {
    let Txn { arena, .. } = txn;
    let member = arena.member_mut(&ctx.user_id).ok_or(StateError::NotMember)?;
    member.abandoned = true;
    Ok(EventOutcome::Close)
}
