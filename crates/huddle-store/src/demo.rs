//! Demo data for local runs.

use huddle_core::errors::StateError;
use huddle_core::ids::{ArenaId, UserId};
use tracing::info;

use crate::memory::MemoryStore;

/// Credentials and arenas created by [`seed_demo`].
#[derive(Clone, Debug)]
pub struct DemoSeed {
    /// Registered facilitator.
    pub facilitator: UserId,
    /// Login session ID for the facilitator (`session_id` cookie value).
    pub facilitator_session: String,
    /// Guest user ID (`user_id` cookie value).
    pub guest: UserId,
    /// Open storyboard.
    pub storyboard: ArenaId,
    /// Battle gated by the join code `DEMO`.
    pub battle: ArenaId,
}

/// Populate `store` with one facilitator, one guest, a storyboard, and a battle.
pub fn seed_demo(store: &MemoryStore) -> Result<DemoSeed, StateError> {
    let facilitator = store.create_user("Demo Facilitator");
    let facilitator_session = store.create_session(&facilitator.id)?;
    let guest = store.create_guest("Demo Guest");
    let storyboard = store.create_storyboard(&facilitator.id, "Demo storyboard", "")?;
    let battle = store.create_battle(
        &facilitator.id,
        "Demo battle",
        &["0", "1", "2", "3", "5", "8", "13", "?"],
        "DEMO",
    )?;

    info!(
        facilitator = %facilitator.id,
        guest = %guest.id,
        storyboard = %storyboard,
        battle = %battle,
        "demo data seeded"
    );

    Ok(DemoSeed {
        facilitator: facilitator.id,
        facilitator_session,
        guest: guest.id,
        storyboard,
        battle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::arena::ArenaKind;
    use huddle_core::services::{ArenaStateService, IdentityResolver};
    use std::sync::Arc;

    #[tokio::test]
    async fn seeded_credentials_resolve() {
        let store = Arc::new(MemoryStore::new(false));
        let seed = seed_demo(&store).unwrap();

        let user = store.resolve_session(&seed.facilitator_session).await.unwrap();
        assert_eq!(user.id, seed.facilitator);
        assert!(store.resolve_guest(seed.guest.as_str()).await.is_ok());

        let battle = store
            .realm(ArenaKind::Poker)
            .get_arena(&seed.battle, &seed.guest)
            .await
            .unwrap();
        assert_eq!(battle.join_code, "DEMO");
        assert!(
            store
                .realm(ArenaKind::Storyboard)
                .get_arena(&seed.storyboard, &seed.guest)
                .await
                .is_ok()
        );
    }
}
