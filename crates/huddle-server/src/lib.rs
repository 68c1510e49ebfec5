//! # huddle-server
//!
//! Real-time hub for collaborative arenas.
//!
//! - **Hub**: one actor per realm owning the arena → subscription map
//! - **WebSocket**: admission with the join-code gate, ingress and egress pumps
//! - **Events**: owner-only authorization, socket dispatch, and the REST bridge
//! - **HTTP**: axum router with health, metrics, and REST endpoints
//! - **Lifecycle**: HTTP drains before the hubs stop and close connections

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod events;
pub mod health;
pub mod hub;
pub mod identity;
pub mod lifecycle;
pub mod metrics;
pub mod realm;
pub mod server;
pub mod websocket;

#[cfg(test)]
mod testutil;

pub use config::ServerConfig;
pub use server::{HuddleServer, RealmSetup};
