//! # huddle
//!
//! Hub server binary: loads settings, wires the in-memory store into the
//! storyboard and poker realms, and serves until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use huddle_core::arena::ArenaKind;
use huddle_core::logging;
use huddle_server::config::ServerConfig;
use huddle_server::server::{HuddleServer, RealmSetup};
use huddle_settings::HuddleSettings;
use huddle_store::{MemoryStore, poker, seed_demo, storyboard};

/// Collaborative arena hub.
#[derive(Parser, Debug)]
#[command(name = "huddle", about = "Real-time hub for storyboards and planning-poker battles")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings, 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.huddle/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Create a demo facilitator, guest, storyboard, and battle at startup.
    #[arg(long)]
    seed_demo: bool,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings.
    fn apply(&self, settings: &mut HuddleSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args.settings.clone().unwrap_or_else(huddle_settings::settings_path);
    let mut settings = huddle_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    args.apply(&mut settings);

    logging::init_subscriber(&settings.logging.level, settings.logging.format);

    let metrics = huddle_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let store = Arc::new(MemoryStore::new(settings.session.allow_multiple_sessions));
    if args.seed_demo {
        let seed = seed_demo(&store).context("Failed to seed demo data")?;
        tracing::info!(
            session_cookie = %seed.facilitator_session,
            guest_cookie = %seed.guest,
            "demo credentials ready"
        );
    }

    let storyboard = RealmSetup {
        registry: storyboard::registry(&store),
        state: Arc::new(store.realm(ArenaKind::Storyboard)),
    };
    let poker = RealmSetup {
        registry: poker::registry(&store),
        state: Arc::new(store.realm(ArenaKind::Poker)),
    };

    let config = ServerConfig::from_settings(&settings);
    let server = HuddleServer::new(config, store, storyboard, poker, metrics);
    let addr = server.listen().await.context("Failed to bind server")?;
    tracing::info!(%addr, "huddle ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");

    server.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
