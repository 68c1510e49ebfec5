//! In-memory users, login sessions, and arenas.
//!
//! [`MemoryStore`] resolves identities directly. Arena state is served per
//! arena kind through [`RealmStore`] views so a storyboard ID never resolves
//! on the poker endpoint and vice versa.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use huddle_core::arena::{Arena, ArenaKind, Member, User, UserKind};
use huddle_core::errors::{EventError, StateError};
use huddle_core::events::{EventContext, EventHandler, EventOutcome};
use huddle_core::ids::{ArenaId, UserId};
use huddle_core::services::{ArenaStateService, IdentityResolver};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::poker::BattleState;
use crate::storyboard::StoryboardState;

/// Kind-specific arena state.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum ArenaDetail {
    Storyboard(StoryboardState),
    Poker(BattleState),
}

impl ArenaDetail {
    fn kind(&self) -> ArenaKind {
        match self {
            Self::Storyboard(_) => ArenaKind::Storyboard,
            Self::Poker(_) => ArenaKind::Poker,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MemberRecord {
    pub id: UserId,
    pub name: String,
    /// Live sessions held by this member.
    pub sessions: u32,
    /// Left the arena for good; hidden once no session is live.
    pub abandoned: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct ArenaRecord {
    pub name: String,
    pub join_code: String,
    pub facilitators: Vec<UserId>,
    pub members: Vec<MemberRecord>,
    pub detail: ArenaDetail,
    /// Set by a concede handler; the arena is dropped once the handler returns.
    pub conceded: bool,
}

impl ArenaRecord {
    fn new(owner: &UserId, name: String, join_code: String, detail: ArenaDetail) -> Self {
        Self {
            name,
            join_code,
            facilitators: vec![owner.clone()],
            members: Vec::new(),
            detail,
            conceded: false,
        }
    }

    pub fn kind(&self) -> ArenaKind {
        self.detail.kind()
    }

    pub fn members(&self) -> Vec<Member> {
        self.members
            .iter()
            .filter(|m| !m.abandoned || m.sessions > 0)
            .map(|m| Member {
                id: m.id.clone(),
                name: m.name.clone(),
                active: m.sessions > 0,
            })
            .collect()
    }

    pub fn snapshot(&self, id: &ArenaId) -> Arena {
        let detail = match serde_json::to_value(&self.detail) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Arena {
            id: id.clone(),
            kind: self.kind(),
            name: self.name.clone(),
            join_code: self.join_code.clone(),
            facilitators: self.facilitators.clone(),
            users: self.members(),
            detail,
        }
    }

    pub fn member_mut(&mut self, user_id: &UserId) -> Option<&mut MemberRecord> {
        self.members.iter_mut().find(|m| &m.id == user_id)
    }
}

/// Mutable view of one arena handed to an event handler under the write lock.
pub(crate) struct Txn<'a> {
    pub arena_id: &'a ArenaId,
    pub arena: &'a mut ArenaRecord,
    pub users: &'a HashMap<UserId, User>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    sessions: HashMap<String, UserId>,
    arenas: HashMap<ArenaId, ArenaRecord>,
}

/// Process-local store of users, login sessions, and arenas.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    allow_multiple_sessions: bool,
}

impl MemoryStore {
    /// Create an empty store.
    ///
    /// With `allow_multiple_sessions` unset, a user already connected to an
    /// arena is reported as a duplicate session.
    pub fn new(allow_multiple_sessions: bool) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            allow_multiple_sessions,
        }
    }

    /// Arena state view for one arena kind.
    pub fn realm(self: &Arc<Self>, kind: ArenaKind) -> RealmStore {
        RealmStore {
            store: Arc::clone(self),
            kind,
        }
    }

    /// Create a registered user.
    pub fn create_user(&self, name: &str) -> User {
        self.insert_user(name, UserKind::Registered)
    }

    /// Create a guest user; its ID doubles as the guest cookie value.
    pub fn create_guest(&self, name: &str) -> User {
        self.insert_user(name, UserKind::Guest)
    }

    fn insert_user(&self, name: &str, kind: UserKind) -> User {
        let user = User {
            id: UserId::new(),
            name: name.to_owned(),
            kind,
        };
        let _ = self.inner.write().users.insert(user.id.clone(), user.clone());
        user
    }

    /// Open a login session for a registered user and return its ID.
    pub fn create_session(&self, user_id: &UserId) -> Result<String, StateError> {
        let mut inner = self.inner.write();
        match inner.users.get(user_id) {
            Some(user) if user.kind == UserKind::Registered => {}
            Some(_) => return Err(StateError::Invalid("guests cannot hold login sessions".into())),
            None => return Err(StateError::NotFound),
        }
        let session_id = uuid::Uuid::now_v7().to_string();
        let _ = inner.sessions.insert(session_id.clone(), user_id.clone());
        Ok(session_id)
    }

    /// Create a storyboard owned (and facilitated) by `owner`.
    pub fn create_storyboard(
        &self,
        owner: &UserId,
        name: &str,
        join_code: &str,
    ) -> Result<ArenaId, StateError> {
        self.insert_arena(
            owner,
            name,
            join_code,
            ArenaDetail::Storyboard(StoryboardState::default()),
        )
    }

    /// Create a poker battle owned (and facilitated) by `owner`.
    pub fn create_battle(
        &self,
        owner: &UserId,
        name: &str,
        point_values_allowed: &[&str],
        join_code: &str,
    ) -> Result<ArenaId, StateError> {
        let state = BattleState::new(point_values_allowed.iter().map(|v| (*v).to_owned()).collect());
        self.insert_arena(owner, name, join_code, ArenaDetail::Poker(state))
    }

    fn insert_arena(
        &self,
        owner: &UserId,
        name: &str,
        join_code: &str,
        detail: ArenaDetail,
    ) -> Result<ArenaId, StateError> {
        if name.trim().is_empty() {
            return Err(StateError::Invalid("arena name is required".into()));
        }
        let mut inner = self.inner.write();
        if !inner.users.contains_key(owner) {
            return Err(StateError::NotFound);
        }
        let id = ArenaId::new();
        let record = ArenaRecord::new(owner, name.to_owned(), join_code.to_owned(), detail);
        debug!(arena_id = %id, kind = record.kind().label(), "arena created");
        let _ = inner.arenas.insert(id.clone(), record);
        Ok(id)
    }

    /// Record `user_id` as an (inactive) member, as if they joined earlier.
    pub fn add_member(&self, arena_id: &ArenaId, user_id: &UserId) -> Result<(), StateError> {
        let mut inner = self.inner.write();
        let Inner { users, arenas, .. } = &mut *inner;
        let user = users.get(user_id).ok_or(StateError::NotFound)?;
        let arena = arenas.get_mut(arena_id).ok_or(StateError::NotFound)?;
        if arena.member_mut(user_id).is_none() {
            arena.members.push(MemberRecord {
                id: user.id.clone(),
                name: user.name.clone(),
                sessions: 0,
                abandoned: false,
            });
        }
        Ok(())
    }

    /// Whether an arena with this ID exists (of any kind).
    pub fn contains_arena(&self, arena_id: &ArenaId) -> bool {
        self.inner.read().arenas.contains_key(arena_id)
    }

    /// Run `f` against one arena of `kind` under the write lock.
    ///
    /// A record marked conceded by `f` is removed afterwards.
    pub(crate) fn apply<R>(
        &self,
        kind: ArenaKind,
        arena_id: &ArenaId,
        f: impl FnOnce(Txn<'_>) -> Result<R, EventError>,
    ) -> Result<R, EventError> {
        let mut inner = self.inner.write();
        let Inner { users, arenas, .. } = &mut *inner;
        let arena = arenas
            .get_mut(arena_id)
            .filter(|a| a.kind() == kind)
            .ok_or(StateError::NotFound)?;
        let result = f(Txn {
            arena_id,
            arena: &mut *arena,
            users,
        });
        if arena.conceded {
            let _ = arenas.remove(arena_id);
            debug!(arena_id = %arena_id, "arena conceded and removed");
        }
        result
    }

    fn read_arena<R>(
        &self,
        kind: ArenaKind,
        arena_id: &ArenaId,
        f: impl FnOnce(&ArenaRecord) -> R,
    ) -> Result<R, StateError> {
        let inner = self.inner.read();
        inner
            .arenas
            .get(arena_id)
            .filter(|a| a.kind() == kind)
            .map(f)
            .ok_or(StateError::NotFound)
    }
}

#[async_trait]
impl IdentityResolver for MemoryStore {
    async fn resolve_session(&self, session_id: &str) -> Result<User, StateError> {
        let inner = self.inner.read();
        inner
            .sessions
            .get(session_id)
            .and_then(|user_id| inner.users.get(user_id))
            .cloned()
            .ok_or(StateError::Unauthorized)
    }

    async fn resolve_guest(&self, user_id: &str) -> Result<User, StateError> {
        let inner = self.inner.read();
        match inner.users.get(user_id) {
            Some(user) if user.kind == UserKind::Guest => Ok(user.clone()),
            _ => Err(StateError::Unauthorized),
        }
    }
}

/// [`ArenaStateService`] over the arenas of one kind in a [`MemoryStore`].
#[derive(Clone)]
pub struct RealmStore {
    store: Arc<MemoryStore>,
    kind: ArenaKind,
}

impl RealmStore {
    /// Arena kind served by this view.
    pub fn kind(&self) -> ArenaKind {
        self.kind
    }
}

#[async_trait]
impl ArenaStateService for RealmStore {
    async fn get_arena(&self, arena_id: &ArenaId, _user_id: &UserId) -> Result<Arena, StateError> {
        self.store
            .read_arena(self.kind, arena_id, |a| a.snapshot(arena_id))
    }

    async fn get_active_status(&self, arena_id: &ArenaId, user_id: &UserId) -> Result<(), StateError> {
        let allow_multiple = self.store.allow_multiple_sessions;
        self.store.read_arena(self.kind, arena_id, |a| {
            match a.members.iter().find(|m| &m.id == user_id) {
                None => Err(StateError::NotMember),
                Some(m) if m.sessions > 0 && !allow_multiple => Err(StateError::DuplicateSession),
                Some(_) => Ok(()),
            }
        })?
    }

    async fn add_user(&self, arena_id: &ArenaId, user_id: &UserId) -> Result<Vec<Member>, StateError> {
        let mut inner = self.store.inner.write();
        let Inner { users, arenas, .. } = &mut *inner;
        let user = users.get(user_id).ok_or(StateError::NotFound)?;
        let arena = arenas
            .get_mut(arena_id)
            .filter(|a| a.kind() == self.kind)
            .ok_or(StateError::NotFound)?;
        match arena.member_mut(user_id) {
            Some(member) => {
                member.sessions += 1;
                member.abandoned = false;
            }
            None => arena.members.push(MemberRecord {
                id: user.id.clone(),
                name: user.name.clone(),
                sessions: 1,
                abandoned: false,
            }),
        }
        Ok(arena.members())
    }

    async fn remove_user(&self, arena_id: &ArenaId, user_id: &UserId) -> Vec<Member> {
        let mut inner = self.store.inner.write();
        let Some(arena) = inner
            .arenas
            .get_mut(arena_id)
            .filter(|a| a.kind() == self.kind)
        else {
            return Vec::new();
        };
        if let Some(member) = arena.member_mut(user_id) {
            member.sessions = member.sessions.saturating_sub(1);
        }
        arena.members()
    }

    async fn confirm_facilitator(&self, arena_id: &ArenaId, user_id: &UserId) -> Result<(), StateError> {
        let is_facilitator = self
            .store
            .read_arena(self.kind, arena_id, |a| a.facilitators.contains(user_id))?;
        if is_facilitator {
            Ok(())
        } else {
            Err(StateError::NotFacilitator)
        }
    }
}

/// Signature of a synchronous arena event applied under the store lock.
pub(crate) type ApplyFn = fn(Txn<'_>, &EventContext, &str) -> Result<EventOutcome, EventError>;

/// [`EventHandler`] running an [`ApplyFn`] against a [`MemoryStore`] arena.
pub(crate) struct StoreHandler {
    store: Arc<MemoryStore>,
    kind: ArenaKind,
    apply: ApplyFn,
}

impl StoreHandler {
    pub(crate) fn new(store: &Arc<MemoryStore>, kind: ArenaKind, apply: ApplyFn) -> Self {
        Self {
            store: Arc::clone(store),
            kind,
            apply,
        }
    }
}

#[async_trait]
impl EventHandler for StoreHandler {
    async fn handle(&self, ctx: &EventContext, value: &str) -> Result<EventOutcome, EventError> {
        self.store
            .apply(self.kind, &ctx.arena_id, |txn| (self.apply)(txn, ctx, value))
    }
}
