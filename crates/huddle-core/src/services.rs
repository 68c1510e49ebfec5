//! Contracts the hub requires from the excluded subsystems.
//!
//! Persistence, login sessions, and guest accounts live outside the hub.
//! The hub reaches them only through these two traits.

use async_trait::async_trait;

use crate::arena::{Arena, Member, User};
use crate::errors::StateError;
use crate::ids::{ArenaId, UserId};

/// Resolves transport-level credentials to a user.
///
/// Any error is treated as "unauthorized" by the hub.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve a login session ID.
    async fn resolve_session(&self, session_id: &str) -> Result<User, StateError>;

    /// Resolve a guest user ID taken from the guest cookie.
    async fn resolve_guest(&self, user_id: &str) -> Result<User, StateError>;
}

/// Owner of durable arena data: membership, join codes, facilitator roles.
#[async_trait]
pub trait ArenaStateService: Send + Sync {
    /// Load the arena snapshot as seen by `user_id`.
    async fn get_arena(&self, arena_id: &ArenaId, user_id: &UserId) -> Result<Arena, StateError>;

    /// Membership status of `user_id`.
    ///
    /// `Ok(())` means a known, currently inactive member.
    /// [`StateError::NotMember`] means the user never joined.
    /// [`StateError::DuplicateSession`] means the user is already connected elsewhere.
    async fn get_active_status(&self, arena_id: &ArenaId, user_id: &UserId)
    -> Result<(), StateError>;

    /// Mark `user_id` active in the arena and return the refreshed member list.
    async fn add_user(&self, arena_id: &ArenaId, user_id: &UserId)
    -> Result<Vec<Member>, StateError>;

    /// Mark `user_id` as having left and return the refreshed member list.
    async fn remove_user(&self, arena_id: &ArenaId, user_id: &UserId) -> Vec<Member>;

    /// `Ok(())` when `user_id` may run owner-only operations.
    async fn confirm_facilitator(&self, arena_id: &ArenaId, user_id: &UserId)
    -> Result<(), StateError>;
}
