//! Mock collaborators for unit tests.

use async_trait::async_trait;
use huddle_core::arena::{Arena, Member, User};
use huddle_core::errors::StateError;
use huddle_core::ids::{ArenaId, UserId};
use huddle_core::services::{ArenaStateService, IdentityResolver};
use mockall::mock;

mock! {
    pub Identity {}

    #[async_trait]
    impl IdentityResolver for Identity {
        async fn resolve_session(&self, session_id: &str) -> Result<User, StateError>;
        async fn resolve_guest(&self, user_id: &str) -> Result<User, StateError>;
    }
}

mock! {
    pub ArenaState {}

    #[async_trait]
    impl ArenaStateService for ArenaState {
        async fn get_arena(&self, arena_id: &ArenaId, user_id: &UserId) -> Result<Arena, StateError>;
        async fn get_active_status(&self, arena_id: &ArenaId, user_id: &UserId) -> Result<(), StateError>;
        async fn add_user(&self, arena_id: &ArenaId, user_id: &UserId) -> Result<Vec<Member>, StateError>;
        async fn remove_user(&self, arena_id: &ArenaId, user_id: &UserId) -> Vec<Member>;
        async fn confirm_facilitator(&self, arena_id: &ArenaId, user_id: &UserId) -> Result<(), StateError>;
    }
}
