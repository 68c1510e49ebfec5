//! # huddle-store
//!
//! Process-local collaborators for the huddle hub:
//!
//! - [`MemoryStore`]: users, login sessions, and arenas behind a
//!   `parking_lot::RwLock`, resolving identities directly and serving arena
//!   state per kind through [`RealmStore`].
//! - [`storyboard::registry`] and [`poker::registry`]: the event handler
//!   sets for each arena kind.

#![deny(unsafe_code)]

mod common;
pub mod demo;
pub mod memory;
pub mod poker;
pub mod storyboard;

pub use common::FACILITATORS_UPDATED;
pub use demo::{DemoSeed, seed_demo};
pub use memory::{MemoryStore, RealmStore};
