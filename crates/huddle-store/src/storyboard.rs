//! Storyboard state and event handlers.

use std::sync::Arc;

use huddle_core::arena::ArenaKind;
use huddle_core::errors::{EventError, StateError};
use huddle_core::events::{EventContext, EventOutcome, EventRegistry};
use huddle_core::wire::SocketEvent;
use serde::{Deserialize, Serialize};

use crate::common;
use crate::memory::{ApplyFn, ArenaDetail, ArenaRecord, MemoryStore, StoreHandler, Txn};

/// Storyboard-specific state carried in the arena snapshot.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryboardState {
    /// Ordered goals (top-level story map columns).
    pub goals: Vec<Goal>,
}

/// One storyboard goal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    /// Goal ID.
    pub id: String,
    /// Goal name.
    pub name: String,
    /// 1-based display position.
    pub sort_order: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoalValue {
    #[serde(default)]
    goal_id: String,
    goal_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditValue {
    storyboard_name: String,
    #[serde(default)]
    join_code: String,
}

/// Build the storyboard event registry.
pub fn registry(store: &Arc<MemoryStore>) -> EventRegistry {
    let handler = |apply: ApplyFn| StoreHandler::new(store, ArenaKind::Storyboard, apply);
    let mut registry = EventRegistry::new();
    registry.register("add_goal", handler(add_goal));
    registry.register("revise_goal", handler(revise_goal));
    registry.register("delete_goal", handler(delete_goal));
    registry.register("abandon_storyboard", handler(common::abandon));
    registry.register_owner_only("facilitator_add", handler(common::facilitator_add));
    registry.register_owner_only("facilitator_remove", handler(common::facilitator_remove));
    registry.register_owner_only("edit_storyboard", handler(edit_storyboard));
    registry.register_owner_only("concede_storyboard", handler(common::concede));
    registry
}

fn state(arena: &mut ArenaRecord) -> Result<&mut StoryboardState, EventError> {
    match &mut arena.detail {
        ArenaDetail::Storyboard(state) => Ok(state),
        ArenaDetail::Poker(_) => Err(StateError::NotFound.into()),
    }
}

fn goals_event(event_type: &str, goals: &[Goal], ctx: &EventContext) -> EventOutcome {
    EventOutcome::Broadcast(SocketEvent::with_json(event_type, goals, ctx.user_id.as_str()))
}

fn add_goal(txn: Txn<'_>, ctx: &EventContext, value: &str) -> Result<EventOutcome, EventError> {
    let GoalValue { goal_name, .. } = serde_json::from_str(value)?;
    if goal_name.trim().is_empty() {
        return Err(EventError::invalid("goalName is required"));
    }
    let state = state(txn.arena)?;
    let sort_order = u32::try_from(state.goals.len()).unwrap_or(u32::MAX).saturating_add(1);
    state.goals.push(Goal {
        id: uuid::Uuid::now_v7().to_string(),
        name: goal_name,
        sort_order,
    });
    Ok(goals_event("goal_added", &state.goals, ctx))
}

fn revise_goal(txn: Txn<'_>, ctx: &EventContext, value: &str) -> Result<EventOutcome, EventError> {
    let GoalValue { goal_id, goal_name } = serde_json::from_str(value)?;
    if goal_name.trim().is_empty() {
        return Err(EventError::invalid("goalName is required"));
    }
    let state = state(txn.arena)?;
    let goal = state
        .goals
        .iter_mut()
        .find(|g| g.id == goal_id)
        .ok_or(StateError::NotFound)?;
    goal.name = goal_name;
    Ok(goals_event("goal_revised", &state.goals, ctx))
}

/// `delete_goal`: value is the bare goal ID.
fn delete_goal(txn: Txn<'_>, ctx: &EventContext, value: &str) -> Result<EventOutcome, EventError> {
    let state = state(txn.arena)?;
    let before = state.goals.len();
    state.goals.retain(|g| g.id != value);
    if state.goals.len() == before {
        return Err(StateError::NotFound.into());
    }
    for (goal, order) in state.goals.iter_mut().zip(1..) {
        goal.sort_order = order;
    }
    Ok(goals_event("goal_deleted", &state.goals, ctx))
}

fn edit_storyboard(txn: Txn<'_>, ctx: &EventContext, value: &str) -> Result<EventOutcome, EventError> {
    let EditValue {
        storyboard_name,
        join_code,
    } = serde_json::from_str(value)?;
    if storyboard_name.trim().is_empty() {
        return Err(EventError::invalid("storyboardName is required"));
    }
    let Txn { arena_id, arena, .. } = txn;
    arena.name = storyboard_name;
    arena.join_code = join_code;
    Ok(EventOutcome::Broadcast(SocketEvent::with_json(
        "storyboard_edited",
        &arena.snapshot(arena_id),
        ctx.user_id.as_str(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FACILITATORS_UPDATED;
    use assert_matches::assert_matches;
    use huddle_core::arena::User;
    use huddle_core::ids::{ArenaId, UserId};
    use huddle_core::services::ArenaStateService;

    struct Fixture {
        store: Arc<MemoryStore>,
        registry: EventRegistry,
        owner: User,
        arena: ArenaId,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new(false));
        let owner = store.create_user("Ada");
        let arena = store.create_storyboard(&owner.id, "Sprint 12", "").unwrap();
        let registry = registry(&store);
        Fixture {
            store,
            registry,
            owner,
            arena,
        }
    }

    impl Fixture {
        async fn send(&self, user: &UserId, event: &str, value: &str) -> Result<EventOutcome, EventError> {
            let ctx = EventContext::new(self.arena.clone(), user.clone());
            self.registry.get(event).unwrap().invoke(&ctx, value).await
        }
    }

    fn broadcast(outcome: EventOutcome) -> SocketEvent {
        match outcome {
            EventOutcome::Broadcast(event) => event,
            EventOutcome::Close => panic!("expected a broadcast"),
        }
    }

    #[test]
    fn owner_only_set() {
        let f = fixture();
        for event in ["facilitator_add", "facilitator_remove", "edit_storyboard", "concede_storyboard"] {
            assert!(f.registry.is_owner_only(event), "{event}");
        }
        for event in ["add_goal", "revise_goal", "delete_goal", "abandon_storyboard"] {
            assert!(!f.registry.is_owner_only(event), "{event}");
        }
    }

    #[tokio::test]
    async fn goal_lifecycle() {
        let f = fixture();
        let added = broadcast(f.send(&f.owner.id, "add_goal", r#"{"goalName":"Onboarding"}"#).await.unwrap());
        assert_eq!(added.event_type, "goal_added");
        assert_eq!(added.user_id, f.owner.id.as_str());
        let goals: Vec<Goal> = serde_json::from_str(&added.value).unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].sort_order, 1);

        let _ = f.send(&f.owner.id, "add_goal", r#"{"goalName":"Billing"}"#).await.unwrap();

        let revise = format!(r#"{{"goalId":"{}","goalName":"Signup"}}"#, goals[0].id);
        let revised = broadcast(f.send(&f.owner.id, "revise_goal", &revise).await.unwrap());
        let goals: Vec<Goal> = serde_json::from_str(&revised.value).unwrap();
        assert_eq!(goals[0].name, "Signup");

        let deleted = broadcast(f.send(&f.owner.id, "delete_goal", &goals[0].id).await.unwrap());
        let goals: Vec<Goal> = serde_json::from_str(&deleted.value).unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].name, "Billing");
        assert_eq!(goals[0].sort_order, 1);
    }

    #[tokio::test]
    async fn invalid_values_rejected() {
        let f = fixture();
        assert_matches!(
            f.send(&f.owner.id, "add_goal", "not json").await,
            Err(EventError::InvalidValue { .. })
        );
        assert_matches!(
            f.send(&f.owner.id, "add_goal", r#"{"goalName":" "}"#).await,
            Err(EventError::InvalidValue { .. })
        );
        assert_matches!(
            f.send(&f.owner.id, "delete_goal", "missing").await,
            Err(EventError::State(StateError::NotFound))
        );
    }

    #[tokio::test]
    async fn facilitator_add_and_remove() {
        let f = fixture();
        let bob = f.store.create_user("Bob");
        let value = format!(r#"{{"userId":"{}"}}"#, bob.id);

        let added = broadcast(f.send(&f.owner.id, "facilitator_add", &value).await.unwrap());
        assert_eq!(added.event_type, FACILITATORS_UPDATED);
        let list: Vec<UserId> = serde_json::from_str(&added.value).unwrap();
        assert_eq!(list, vec![f.owner.id.clone(), bob.id.clone()]);

        let removed = broadcast(f.send(&f.owner.id, "facilitator_remove", &value).await.unwrap());
        let list: Vec<UserId> = serde_json::from_str(&removed.value).unwrap();
        assert_eq!(list, vec![f.owner.id.clone()]);

        let last = format!(r#"{{"userId":"{}"}}"#, f.owner.id);
        assert_matches!(
            f.send(&f.owner.id, "facilitator_remove", &last).await,
            Err(EventError::State(StateError::Invalid(_)))
        );
        assert_matches!(
            f.send(&f.owner.id, "facilitator_add", r#"{"userId":"ghost"}"#).await,
            Err(EventError::State(StateError::NotFound))
        );
    }

    #[tokio::test]
    async fn edit_updates_name_and_join_code() {
        let f = fixture();
        let edited = broadcast(
            f.send(&f.owner.id, "edit_storyboard", r#"{"storyboardName":"Sprint 13","joinCode":"XYZ"}"#)
                .await
                .unwrap(),
        );
        assert_eq!(edited.event_type, "storyboard_edited");

        let arena = f
            .store
            .realm(ArenaKind::Storyboard)
            .get_arena(&f.arena, &f.owner.id)
            .await
            .unwrap();
        assert_eq!(arena.name, "Sprint 13");
        assert_eq!(arena.join_code, "XYZ");
    }

    #[tokio::test]
    async fn concede_removes_arena() {
        let f = fixture();
        let conceded = broadcast(f.send(&f.owner.id, "concede_storyboard", "").await.unwrap());
        assert_eq!(conceded.event_type, "storyboard_conceded");
        assert!(!f.store.contains_arena(&f.arena));
        assert_matches!(
            f.send(&f.owner.id, "add_goal", r#"{"goalName":"x"}"#).await,
            Err(EventError::State(StateError::NotFound))
        );
    }

    #[tokio::test]
    async fn abandon_forces_close_and_drops_membership() {
        let f = fixture();
        let realm = f.store.realm(ArenaKind::Storyboard);
        let _ = realm.add_user(&f.arena, &f.owner.id).await.unwrap();

        let outcome = f.send(&f.owner.id, "abandon_storyboard", "").await.unwrap();
        assert_eq!(outcome, EventOutcome::Close);
        assert!(realm.remove_user(&f.arena, &f.owner.id).await.is_empty());
    }

    #[tokio::test]
    async fn abandon_keeps_other_live_tab_listed() {
        let f = fixture();
        let realm = f.store.realm(ArenaKind::Storyboard);
        let _ = realm.add_user(&f.arena, &f.owner.id).await.unwrap();
        let _ = realm.add_user(&f.arena, &f.owner.id).await.unwrap();

        assert_eq!(f.send(&f.owner.id, "abandon_storyboard", "").await.unwrap(), EventOutcome::Close);
        let members = realm.remove_user(&f.arena, &f.owner.id).await;
        assert_eq!(members.len(), 1);
        assert!(members[0].active);

        assert!(realm.remove_user(&f.arena, &f.owner.id).await.is_empty());
    }

    #[tokio::test]
    async fn rejoin_after_abandon_is_listed_again() {
        let f = fixture();
        let realm = f.store.realm(ArenaKind::Storyboard);
        let _ = realm.add_user(&f.arena, &f.owner.id).await.unwrap();
        let _ = f.send(&f.owner.id, "abandon_storyboard", "").await.unwrap();
        let _ = realm.remove_user(&f.arena, &f.owner.id).await;

        let members = realm.add_user(&f.arena, &f.owner.id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert!(members[0].active);
    }

    #[tokio::test]
    async fn abandon_by_non_member_is_rejected() {
        let f = fixture();
        assert_matches!(
            f.send(&f.owner.id, "abandon_storyboard", "").await,
            Err(EventError::State(StateError::NotMember))
        );
    }
}
