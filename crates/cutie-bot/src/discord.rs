//! Outbound calls to the platform's REST API.
//!
//! The command surface only needs three things from the platform: posting a
//! plain message (the audit channel), overwriting the guild's slash commands
//! and deleting a message.  They sit behind the [`Platform`] trait so that
//! tests can record calls instead of making them.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::BotConfig;

/// Upper bound on any single REST call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Platform answered {status}: {body}")]
    Status { status: u16, body: String },
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// Post a plain-text message to a channel.
    async fn post_message(&self, channel_id: u64, content: &str) -> Result<(), PlatformError>;

    /// Replace every guild command with `commands`; returns how many are now
    /// registered.
    async fn overwrite_guild_commands(
        &self,
        guild_id: u64,
        commands: &[Value],
    ) -> Result<usize, PlatformError>;

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), PlatformError>;
}

/// [`Platform`] implementation over the Discord HTTP API.
#[derive(Debug, Clone)]
pub struct DiscordRest {
    client: reqwest::Client,
    api_base: String,
    token: String,
    application_id: u64,
}

impl DiscordRest {
    pub fn new(config: &BotConfig) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            token: config.token.clone(),
            application_id: config.application_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, PlatformError> {
        let response = request
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Platform for DiscordRest {
    async fn post_message(&self, channel_id: u64, content: &str) -> Result<(), PlatformError> {
        let url = self.url(&format!("/channels/{channel_id}/messages"));
        // no pings from audit lines
        let body = json!({
            "content": content,
            "allowed_mentions": { "parse": [] },
        });

        self.send(self.client.post(url).json(&body)).await?;
        debug!(channel_id, "posted message");
        Ok(())
    }

    async fn overwrite_guild_commands(
        &self,
        guild_id: u64,
        commands: &[Value],
    ) -> Result<usize, PlatformError> {
        let url = self.url(&format!(
            "/applications/{}/guilds/{guild_id}/commands",
            self.application_id
        ));

        let registered: Vec<Value> = self
            .send(self.client.put(url).json(commands))
            .await?
            .json()
            .await?;

        debug!(guild_id, count = registered.len(), "overwrote guild commands");
        Ok(registered.len())
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), PlatformError> {
        let url = self.url(&format!("/channels/{channel_id}/messages/{message_id}"));

        self.send(self.client.delete(url)).await?;
        debug!(channel_id, message_id, "deleted message");
        Ok(())
    }
}
