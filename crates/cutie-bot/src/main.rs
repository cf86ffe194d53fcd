//! # cutie-bot
//!
//! Discord bot that keeps a per-server ledger of "cute points".
//!
//! This binary provides:
//! - **Interactions endpoint** (axum) that verifies Ed25519-signed slash
//!   command and button interactions
//! - **Point ledger** backed by SQLite through `cutie-store`
//! - **Commands** for giving points, viewing your own total, the top-10
//!   leaderboard, profession posts and owner-only command sync
//! - **Embed templates** loaded from JSON, overridable on disk

mod api;
mod commands;
mod config;
mod discord;
mod dispatch;
mod error;
mod interaction;
mod professions;
mod style;
mod verify;

use std::sync::Arc;

use anyhow::Context;
use cutie_store::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::BotConfig;
use crate::discord::DiscordRest;
use crate::style::StyleBook;
use crate::verify::InteractionVerifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cutie_bot=debug,cutie_store=info")),
        )
        .init();

    info!("Starting cutie-bot v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = BotConfig::from_env()?;
    info!(?config, "Loaded configuration");
    if config.give_role_id.is_none() {
        tracing::warn!("CUTE_ROLE_ID not set, nobody can give points");
    }

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let ledger = Database::open_at(&config.database_path)
        .with_context(|| format!("opening ledger at {}", config.database_path.display()))?;
    info!(accounts = ledger.account_count()?, "Ledger ready");

    let styles = StyleBook::load(&config.styles_dir)?;

    let verifier = InteractionVerifier::from_hex(&config.public_key)
        .context("DISCORD_PUBLIC_KEY is not a valid Ed25519 key")?;

    let platform = Arc::new(DiscordRest::new(&config)?);
    let http_addr = config.http_addr;

    let app_state = AppState::new(config, ledger, styles, platform, verifier);

    // -----------------------------------------------------------------------
    // 4. Run the interactions endpoint (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
