//! The command surface over the point ledger.
//!
//! Every command is a plain function of the caller, their roles and the
//! command arguments.  It performs the ledger call and returns a structured
//! [`Reply`]; turning that into an embed is the job of [`crate::style`].
//! Authorization is checked before the ledger is touched.

use cutie_store::{Database, ExternalId};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::BotConfig;
use crate::error::CommandError;

/// Rows shown by `cute_leaderboard`.
pub const LEADERBOARD_SIZE: usize = 10;

pub const GIVE: &str = "cute_give";
pub const POINTS: &str = "cute_points";
pub const LEADERBOARD: &str = "cute_leaderboard";
pub const PROFESSION: &str = "profession";
pub const SYNC: &str = "cute_sync";

// Application command option types
const OPTION_STRING: u8 = 3;
const OPTION_INTEGER: u8 = 4;
const OPTION_USER: u8 = 6;

/// The user invoking a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub external_id: ExternalId,
    /// Guild nick, global name or username, in that order.
    pub display_name: String,
    pub username: String,
    pub avatar_url: String,
    pub roles: Vec<u64>,
}

impl Caller {
    pub fn has_role(&self, role: u64) -> bool {
        self.roles.contains(&role)
    }
}

/// The user a command acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub external_id: ExternalId,
    pub display_name: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    /// 1-based.
    pub rank: usize,
    pub display_name: String,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Given { target: Target, points: i64, total: i64 },
    Points { points: i64 },
    Leaderboard { entries: Vec<RankedEntry> },
}

/// Who may run the privileged commands.
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    /// Role needed to give points.  `None` disables giving.
    pub give_role: Option<u64>,
    /// User allowed to sync commands.
    pub owner: Option<ExternalId>,
}

impl Permissions {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            give_role: config.give_role_id,
            owner: config.owner_id,
        }
    }

    pub fn can_give(&self, caller: &Caller) -> bool {
        self.give_role.is_some_and(|role| caller.has_role(role))
    }

    pub fn is_owner(&self, caller: &Caller) -> bool {
        self.owner == Some(caller.external_id)
    }
}

/// Add (or with a negative value, take away) points from `target`.
pub fn give(
    db: &Database,
    permissions: &Permissions,
    caller: &Caller,
    target: &Target,
    points: i64,
) -> Result<Reply, CommandError> {
    if !permissions.can_give(caller) {
        info!(caller = %caller.external_id, "give rejected: missing role");
        return Err(CommandError::Unauthorized);
    }

    let total = db.increment(target.external_id, &target.display_name, points)?;

    info!(
        caller = %caller.external_id,
        target = %target.external_id,
        points,
        total,
        "points given"
    );

    Ok(Reply::Given {
        target: target.clone(),
        points,
        total,
    })
}

/// The caller's own total; creates their account on first use.
pub fn view_self(db: &Database, caller: &Caller) -> Result<Reply, CommandError> {
    let account = db.get_or_create(caller.external_id, &caller.display_name)?;
    debug!(caller = %caller.external_id, points = account.points, "points viewed");

    Ok(Reply::Points {
        points: account.points,
    })
}

pub fn leaderboard(db: &Database) -> Result<Reply, CommandError> {
    let entries = db
        .top_n(LEADERBOARD_SIZE)?
        .into_iter()
        .enumerate()
        .map(|(i, entry)| RankedEntry {
            rank: i + 1,
            display_name: entry.display_name,
            points: entry.points,
        })
        .collect();

    Ok(Reply::Leaderboard { entries })
}

/// Line posted to the audit channel after a successful give.
pub fn audit_line(caller: &Caller, target: &Target, points: i64) -> String {
    format!(
        "{} gave {} {} point(s)",
        caller.username, target.username, points
    )
}

/// Slash-command definitions registered by `cute_sync`.
pub fn definitions() -> Vec<Value> {
    vec![
        json!({
            "name": GIVE,
            "description": "Give cute points to a member (or take em away >:3)",
            "options": [
                {
                    "name": "points",
                    "description": "How many points to give (negative takes them away)",
                    "type": OPTION_INTEGER,
                    "required": true
                },
                {
                    "name": "user",
                    "description": "Who gets the points",
                    "type": OPTION_USER,
                    "required": true
                }
            ]
        }),
        json!({
            "name": POINTS,
            "description": "Look at your own points:3"
        }),
        json!({
            "name": LEADERBOARD,
            "description": "Look at the cute leaderboard :3"
        }),
        json!({
            "name": PROFESSION,
            "description": "meowfession descwiption",
            "options": [
                {
                    "name": "name",
                    "description": "Title of the post",
                    "type": OPTION_STRING,
                    "required": true
                },
                {
                    "name": "description",
                    "description": "What you offer",
                    "type": OPTION_STRING,
                    "required": true
                },
                {
                    "name": "requirements",
                    "description": "Comma separated, one per line",
                    "type": OPTION_STRING,
                    "required": true
                }
            ]
        }),
        json!({
            "name": SYNC,
            "description": "Register the bot's commands in this guild"
        }),
    ]
}
