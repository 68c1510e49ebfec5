//! # huddle-core
//!
//! Foundation types shared by every huddle crate.
//!
//! - **Branded IDs**: `ArenaId`, `UserId`, `ConnectionId` as newtypes for type safety
//! - **Arena model**: `Arena` snapshots, `Member` lists, resolved `User` identities
//! - **Wire frames**: inbound `{type, value}` frames and outbound `{type, value, userId}` events
//! - **Close codes**: the numeric codes emitted when admission or a session ends abnormally
//! - **Collaborator traits**: identity resolution and the Arena State Service
//! - **Event registry**: event-type name to handler mapping with owner-only marking
//! - **Logging**: `tracing` subscriber bootstrap

#![deny(unsafe_code)]

pub mod arena;
pub mod close;
pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
pub mod services;
pub mod wire;
