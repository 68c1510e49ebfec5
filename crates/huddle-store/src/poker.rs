//! Planning-poker battle state and event handlers.

use std::sync::Arc;

use huddle_core::arena::ArenaKind;
use huddle_core::errors::{EventError, StateError};
use huddle_core::events::{EventContext, EventOutcome, EventRegistry};
use huddle_core::ids::UserId;
use huddle_core::wire::SocketEvent;
use serde::{Deserialize, Serialize};

use crate::common;
use crate::memory::{ApplyFn, ArenaDetail, ArenaRecord, MemoryStore, StoreHandler, Txn};

/// Battle-specific state carried in the arena snapshot.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleState {
    /// Vote values players may choose from.
    pub point_values_allowed: Vec<String>,
    /// Plans (stories) to estimate, in creation order.
    pub plans: Vec<Plan>,
    /// Plan currently being voted on.
    pub active_plan_id: Option<String>,
    /// Set once the facilitator ends voting on the active plan.
    pub voting_locked: bool,
}

impl BattleState {
    pub(crate) fn new(point_values_allowed: Vec<String>) -> Self {
        Self {
            point_values_allowed,
            plans: Vec::new(),
            active_plan_id: None,
            voting_locked: true,
        }
    }

    fn plan_mut(&mut self, plan_id: &str) -> Result<&mut Plan, EventError> {
        self.plans
            .iter_mut()
            .find(|p| p.id == plan_id)
            .ok_or_else(|| StateError::NotFound.into())
    }
}

/// A story estimated during a battle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Plan ID.
    pub id: String,
    /// Plan title.
    pub name: String,
    /// Story type (e.g. `Story`, `Bug`).
    #[serde(rename = "type")]
    pub plan_type: String,
    /// External tracker reference.
    pub reference_id: String,
    /// Link to the story.
    pub link: String,
    /// Description text.
    pub description: String,
    /// Acceptance criteria text.
    pub acceptance_criteria: String,
    /// Votes cast during the current round.
    pub votes: Vec<Vote>,
    /// Whether this plan is being voted on.
    pub active: bool,
}

/// One player's vote on a plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    /// Voter.
    pub user_id: UserId,
    /// Chosen point value.
    pub vote_value: String,
}

/// `add_plan` value, also accepted as the REST request body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanValue {
    plan_name: String,
    #[serde(rename = "type", default)]
    plan_type: String,
    #[serde(default)]
    reference_id: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    acceptance_criteria: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoteValue {
    plan_id: String,
    vote_value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditValue {
    battle_name: String,
    #[serde(default)]
    point_values_allowed: Option<Vec<String>>,
    #[serde(default)]
    join_code: String,
}

/// Build the poker event registry.
pub fn registry(store: &Arc<MemoryStore>) -> EventRegistry {
    let handler = |apply: ApplyFn| StoreHandler::new(store, ArenaKind::Poker, apply);
    let mut registry = EventRegistry::new();
    registry.register("vote", handler(vote));
    registry.register("abandon_battle", handler(common::abandon));
    registry.register_owner_only("add_plan", handler(add_plan));
    registry.register_owner_only("activate_plan", handler(activate_plan));
    registry.register_owner_only("end_voting", handler(end_voting));
    registry.register_owner_only("facilitator_add", handler(common::facilitator_add));
    registry.register_owner_only("facilitator_remove", handler(common::facilitator_remove));
    registry.register_owner_only("edit_battle", handler(edit_battle));
    registry.register_owner_only("concede_battle", handler(common::concede));
    registry
}

fn state(arena: &mut ArenaRecord) -> Result<&mut BattleState, EventError> {
    match &mut arena.detail {
        ArenaDetail::Poker(state) => Ok(state),
        ArenaDetail::Storyboard(_) => Err(StateError::NotFound.into()),
    }
}

fn plans_event(event_type: &str, plans: &[Plan], ctx: &EventContext) -> EventOutcome {
    EventOutcome::Broadcast(SocketEvent::with_json(event_type, plans, ctx.user_id.as_str()))
}

fn add_plan(txn: Txn<'_>, ctx: &EventContext, value: &str) -> Result<EventOutcome, EventError> {
    let plan: PlanValue = serde_json::from_str(value)?;
    if plan.plan_name.trim().is_empty() {
        return Err(EventError::invalid("planName is required"));
    }
    let state = state(txn.arena)?;
    state.plans.push(Plan {
        id: uuid::Uuid::now_v7().to_string(),
        name: plan.plan_name,
        plan_type: plan.plan_type,
        reference_id: plan.reference_id,
        link: plan.link,
        description: plan.description,
        acceptance_criteria: plan.acceptance_criteria,
        votes: Vec::new(),
        active: false,
    });
    Ok(plans_event("plan_added", &state.plans, ctx))
}

/// `activate_plan`: value is the bare plan ID. Starts a fresh voting round.
fn activate_plan(txn: Txn<'_>, ctx: &EventContext, value: &str) -> Result<EventOutcome, EventError> {
    let Txn { arena_id, arena, .. } = txn;
    let state = state(arena)?;
    let _ = state.plan_mut(value)?;
    for plan in &mut state.plans {
        plan.active = plan.id == value;
        if plan.active {
            plan.votes.clear();
        }
    }
    state.active_plan_id = Some(value.to_owned());
    state.voting_locked = false;
    Ok(EventOutcome::Broadcast(SocketEvent::with_json(
        "plan_activated",
        &arena.snapshot(arena_id),
        ctx.user_id.as_str(),
    )))
}

fn vote(txn: Txn<'_>, ctx: &EventContext, value: &str) -> Result<EventOutcome, EventError> {
    let VoteValue {
        plan_id,
        vote_value,
    } = serde_json::from_str(value)?;
    let state = state(txn.arena)?;
    if state.voting_locked || state.active_plan_id.as_deref() != Some(plan_id.as_str()) {
        return Err(StateError::Invalid("voting is not open for this plan".into()).into());
    }
    if !state.point_values_allowed.contains(&vote_value) {
        return Err(EventError::invalid(format!("{vote_value} is not an allowed point value")));
    }
    let plan = state.plan_mut(&plan_id)?;
    match plan.votes.iter_mut().find(|v| v.user_id == ctx.user_id) {
        Some(existing) => existing.vote_value = vote_value,
        None => plan.votes.push(Vote {
            user_id: ctx.user_id.clone(),
            vote_value,
        }),
    }
    Ok(plans_event("vote_activity", &state.plans, ctx))
}

/// `end_voting`: value is the bare plan ID of the active plan.
fn end_voting(txn: Txn<'_>, ctx: &EventContext, value: &str) -> Result<EventOutcome, EventError> {
    let state = state(txn.arena)?;
    if state.active_plan_id.as_deref() != Some(value) {
        return Err(StateError::Invalid("plan is not active".into()).into());
    }
    state.voting_locked = true;
    Ok(plans_event("voting_ended", &state.plans, ctx))
}

fn edit_battle(txn: Txn<'_>, ctx: &EventContext, value: &str) -> Result<EventOutcome, EventError> {
    let EditValue {
        battle_name,
        point_values_allowed,
        join_code,
    } = serde_json::from_str(value)?;
    if battle_name.trim().is_empty() {
        return Err(EventError::invalid("battleName is required"));
    }
    let Txn { arena_id, arena, .. } = txn;
    if let Some(values) = point_values_allowed {
        if values.is_empty() {
            return Err(EventError::invalid("pointValuesAllowed must not be empty"));
        }
        state(arena)?.point_values_allowed = values;
    }
    arena.name = battle_name;
    arena.join_code = join_code;
    Ok(EventOutcome::Broadcast(SocketEvent::with_json(
        "battle_revised",
        &arena.snapshot(arena_id),
        ctx.user_id.as_str(),
    )))
}
