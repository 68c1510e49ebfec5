//! Arena, member, and user model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{ArenaId, UserId};

/// The two kinds of collaborative arena the hub serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArenaKind {
    /// Story mapping board.
    Storyboard,
    /// Planning-poker game (a "battle").
    Poker,
}

impl ArenaKind {
    /// Event type a gated connection must send to submit the join code.
    pub fn auth_event(self) -> &'static str {
        match self {
            Self::Storyboard => "auth_storyboard",
            Self::Poker => "auth_battle",
        }
    }

    /// Short human label used in close reasons and logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Storyboard => "storyboard",
            Self::Poker => "battle",
        }
    }
}

/// Whether a user holds a registered account or a guest identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserKind {
    /// Account with a login session.
    Registered,
    /// Cookie-only guest.
    Guest,
}

/// A resolved user identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Account kind.
    pub kind: UserKind,
}

/// One entry of an arena's membership list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// User ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Whether the user currently holds at least one live session.
    pub active: bool,
}

/// Full arena snapshot as sent to a newly admitted connection.
///
/// Fields common to every arena kind are typed; the kind-specific state
/// (goals, plans, votes) travels in `detail` and is flattened on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arena {
    /// Arena ID.
    pub id: ArenaId,
    /// Arena kind.
    pub kind: ArenaKind,
    /// Display name.
    pub name: String,
    /// Join code; empty means the arena is open.
    #[serde(default)]
    pub join_code: String,
    /// Users currently allowed to run owner-only operations.
    #[serde(default)]
    pub facilitators: Vec<UserId>,
    /// Membership list.
    #[serde(default)]
    pub users: Vec<Member>,
    /// Kind-specific state.
    #[serde(flatten)]
    pub detail: Map<String, Value>,
}

impl Arena {
    /// Whether admission requires a join code.
    pub fn is_gated(&self) -> bool {
        !self.join_code.is_empty()
    }

    /// Whether `user_id` is a facilitator of this arena.
    pub fn is_facilitator(&self, user_id: &UserId) -> bool {
        self.facilitators.contains(user_id)
    }
}
