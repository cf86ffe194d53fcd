//! Bot configuration loaded from environment variables.
//!
//! The platform credentials are required; everything else has a default so
//! the bot can start against a local database with minimal setup.  The
//! guild/role/channel ids are opaque values handed to the command surface.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use cutie_store::ExternalId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Bot configuration.
#[derive(Clone)]
pub struct BotConfig {
    /// Bot token used for REST calls.
    /// Env: `DISCORD_TOKEN` (required)
    pub token: String,

    /// Application id, needed to overwrite guild commands.
    /// Env: `DISCORD_APPLICATION_ID` (required)
    pub application_id: u64,

    /// Hex-encoded Ed25519 key that signs incoming interactions.
    /// Env: `DISCORD_PUBLIC_KEY` (required)
    pub public_key: String,

    /// User allowed to run `cute_sync`.
    /// Env: `BOT_OWNER`
    pub owner_id: Option<ExternalId>,

    /// Role required for `cute_give`.  Unset means nobody may give points.
    /// Env: `CUTE_ROLE_ID`
    pub give_role_id: Option<u64>,

    /// Channel receiving "X gave Y N point(s)" notifications.
    /// Env: `CUTE_CHANNEL`
    pub audit_channel_id: Option<u64>,

    /// Guild the commands belong to.  Interactions from elsewhere are refused.
    /// Env: `GUILD_ID`
    pub guild_id: Option<u64>,

    /// SQLite ledger file.
    /// Env: `DATABASE_PATH`
    /// Default: `owodb.db`
    pub database_path: PathBuf,

    /// Directory with embed template overrides.
    /// Env: `STYLES_DIR`
    /// Default: `./styles`
    pub styles_dir: PathBuf,

    /// Socket address for the interactions endpoint.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Base URL of the platform REST API.
    /// Env: `DISCORD_API_BASE`
    /// Default: `https://discord.com/api/v10`
    pub api_base: String,
}

// Keeps the token out of `info!(?config)`.
impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("application_id", &self.application_id)
            .field("public_key", &self.public_key)
            .field("owner_id", &self.owner_id)
            .field("give_role_id", &self.give_role_id)
            .field("audit_channel_id", &self.audit_channel_id)
            .field("guild_id", &self.guild_id)
            .field("database_path", &self.database_path)
            .field("styles_dir", &self.styles_dir)
            .field("http_addr", &self.http_addr)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl BotConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let application_id = get("DISCORD_APPLICATION_ID")
            .ok_or(ConfigError::Missing("DISCORD_APPLICATION_ID"))?
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::Invalid {
                name: "DISCORD_APPLICATION_ID",
                reason: e.to_string(),
            })?;

        let public_key = get("DISCORD_PUBLIC_KEY")
            .ok_or(ConfigError::Missing("DISCORD_PUBLIC_KEY"))?
            .trim()
            .to_string();
        if public_key.len() != 64 || hex::decode(&public_key).is_err() {
            return Err(ConfigError::Invalid {
                name: "DISCORD_PUBLIC_KEY",
                reason: format!("expected 64 hex chars, got {:?}", public_key),
            });
        }

        let mut config = Self {
            token,
            application_id,
            public_key,
            owner_id: None,
            give_role_id: None,
            audit_channel_id: None,
            guild_id: None,
            database_path: PathBuf::from("owodb.db"),
            styles_dir: PathBuf::from("./styles"),
            http_addr: ([0, 0, 0, 0], 8080).into(),
            api_base: "https://discord.com/api/v10".to_string(),
        };

        config.owner_id = parse_optional(get("BOT_OWNER"), "BOT_OWNER");
        config.give_role_id = parse_optional(get("CUTE_ROLE_ID"), "CUTE_ROLE_ID");
        config.audit_channel_id = parse_optional(get("CUTE_CHANNEL"), "CUTE_CHANNEL");
        config.guild_id = parse_optional(get("GUILD_ID"), "GUILD_ID");

        if let Some(path) = get("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(dir) = get("STYLES_DIR") {
            config.styles_dir = PathBuf::from(dir);
        }

        if let Some(addr) = get("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(base) = get("DISCORD_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }

        Ok(config)
    }
}

/// Parse an optional id, warning and ignoring it when it is malformed.
fn parse_optional<T>(value: Option<String>, name: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    let value = value?;
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(variable = name, value = %value, error = %e, "Ignoring invalid id");
            None
        }
    }
}
