//! Interaction wire types.
//!
//! Only the subset of the platform's interaction payload that the bot reads
//! is modelled; unknown fields are ignored.  Snowflakes arrive as decimal
//! strings.

use std::collections::HashMap;

use cutie_store::ExternalId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::{Caller, Target};
use crate::style::Embed;

// Interaction types
pub const PING: u8 = 1;
pub const APPLICATION_COMMAND: u8 = 2;
pub const MESSAGE_COMPONENT: u8 = 3;

// Response types
pub const PONG: u8 = 1;
pub const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;
pub const DEFERRED_UPDATE_MESSAGE: u8 = 6;

/// Message flag that makes a reply visible to the invoking user only.
pub const EPHEMERAL: u64 = 1 << 6;

const CDN_BASE: &str = "https://cdn.discordapp.com";

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub data: Option<InteractionData>,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Present for interactions inside a guild.
    #[serde(default)]
    pub member: Option<Member>,
    /// Present for interactions in DMs.
    #[serde(default)]
    pub user: Option<User>,
    /// The message a component is attached to.
    #[serde(default)]
    pub message: Option<MessageRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    #[serde(default)]
    pub resolved: Option<Resolved>,
    /// Set for component interactions.
    #[serde(default)]
    pub custom_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Resolved {
    #[serde(default)]
    pub users: HashMap<String, User>,
    #[serde(default)]
    pub members: HashMap<String, Member>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
}

impl User {
    /// Name shown for the user outside of any guild.
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }

    pub fn avatar_url(&self) -> String {
        match &self.avatar {
            Some(hash) => format!("{CDN_BASE}/avatars/{}/{hash}.png", self.id),
            None => {
                // default avatars are indexed by (id >> 22) % 6
                let index = self.id.parse::<u64>().map(|id| (id >> 22) % 6).unwrap_or(0);
                format!("{CDN_BASE}/embed/avatars/{index}.png")
            }
        }
    }
}

impl Interaction {
    /// The user who triggered the interaction, with their guild roles.
    pub fn caller(&self) -> Option<Caller> {
        let (user, nick, roles) = match &self.member {
            Some(member) => (member.user.as_ref()?, member.nick.as_deref(), &member.roles[..]),
            None => (self.user.as_ref()?, None, &[][..]),
        };

        Some(Caller {
            external_id: user.id.parse().ok()?,
            display_name: nick.unwrap_or_else(|| user.display_name()).to_string(),
            username: user.username.clone(),
            avatar_url: user.avatar_url(),
            roles: roles.iter().filter_map(|r| r.parse().ok()).collect(),
        })
    }

    pub fn guild(&self) -> Option<u64> {
        self.guild_id.as_deref().and_then(|g| g.parse().ok())
    }

    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref()?.name.as_deref()
    }

    pub fn custom_id(&self) -> Option<&str> {
        self.data.as_ref()?.custom_id.as_deref()
    }
}

impl InteractionData {
    fn option(&self, name: &str) -> Option<&Value> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .and_then(|o| o.value.as_ref())
    }

    pub fn option_i64(&self, name: &str) -> Option<i64> {
        self.option(name)?.as_i64()
    }

    pub fn option_str(&self, name: &str) -> Option<&str> {
        self.option(name)?.as_str()
    }

    /// Resolve a USER option to the target account, preferring the guild nick.
    pub fn option_user(&self, name: &str) -> Option<Target> {
        let id = self.option(name)?.as_str()?;
        let resolved = self.resolved.as_ref()?;
        let user = resolved.users.get(id)?;
        let nick = resolved.members.get(id).and_then(|m| m.nick.as_deref());

        Some(Target {
            external_id: id.parse::<ExternalId>().ok()?,
            display_name: nick.unwrap_or_else(|| user.display_name()).to_string(),
            username: user.username.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResponseData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self {
            kind: PONG,
            data: None,
        }
    }

    /// Acknowledge a component click without changing the message.
    pub fn acknowledge() -> Self {
        Self {
            kind: DEFERRED_UPDATE_MESSAGE,
            data: None,
        }
    }

    /// A card only the caller can see.
    pub fn ephemeral(embed: Embed) -> Self {
        Self::message(embed, Vec::new(), Some(EPHEMERAL))
    }

    /// A card visible to the whole channel.
    pub fn public(embed: Embed, components: Vec<Value>) -> Self {
        Self::message(embed, components, None)
    }

    fn message(embed: Embed, components: Vec<Value>, flags: Option<u64>) -> Self {
        Self {
            kind: CHANNEL_MESSAGE_WITH_SOURCE,
            data: Some(ResponseData {
                content: None,
                embeds: vec![embed],
                components,
                flags,
            }),
        }
    }

    pub fn embed(&self) -> Option<&Embed> {
        self.data.as_ref()?.embeds.first()
    }
}
