//! Routes verified interactions to the command surface.
//!
//! This is the single place where command errors are caught.  Each one is
//! logged with its detail and answered with a short, generic error card.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::api::AppState;
use crate::commands::{self, Caller, Reply, Target};
use crate::error::{CommandError, ServerError};
use crate::interaction::{
    Interaction, InteractionData, InteractionResponse, APPLICATION_COMMAND, MESSAGE_COMPONENT,
    PING,
};
use crate::professions::{self, ProfessionError, ProfessionPost};
use crate::style::{Embed, StyleBook};

const NOT_ALLOWED: &str = "You are not allowed to do that";
const WRONG_GUILD: &str = "This command is not available here";
const GENERIC_FAILURE: &str = "An error occurred while processing your request.";

pub async fn dispatch(
    state: &AppState,
    interaction: &Interaction,
) -> Result<InteractionResponse, ServerError> {
    match interaction.kind {
        PING => Ok(InteractionResponse::pong()),
        APPLICATION_COMMAND => Ok(run_command(state, interaction).await),
        MESSAGE_COMPONENT => Ok(run_component(state, interaction).await),
        other => Err(ServerError::BadRequest(format!(
            "Unsupported interaction type {other}"
        ))),
    }
}

async fn run_command(state: &AppState, interaction: &Interaction) -> InteractionResponse {
    let Some(caller) = interaction.caller() else {
        warn!(id = %interaction.id, "interaction without a usable user");
        return InteractionResponse::ephemeral(Embed::error(GENERIC_FAILURE));
    };

    if let Some(guild) = state.config.guild_id {
        if interaction.guild() != Some(guild) {
            info!(caller = %caller.external_id, guild = ?interaction.guild(), "command outside the configured guild");
            return InteractionResponse::ephemeral(Embed::error(WRONG_GUILD));
        }
    }

    let empty = InteractionData::default();
    let data = interaction.data.as_ref().unwrap_or(&empty);
    let name = interaction.command_name().unwrap_or_default();

    match name {
        commands::GIVE => give(state, &caller, data).await,
        commands::POINTS => {
            let failed = "Failed to retrieve your cute points";
            ledger_command(state, &caller, name, failed, |db| {
                commands::view_self(db, &caller)
            })
        }
        commands::LEADERBOARD => {
            let failed = "Failed to retrieve leaderboard data";
            ledger_command(state, &caller, name, failed, commands::leaderboard)
        }
        commands::PROFESSION => profession(state, &caller, data),
        commands::SYNC => sync(state, &caller, interaction).await,
        other => {
            warn!(command = other, "unknown command");
            InteractionResponse::ephemeral(Embed::error(GENERIC_FAILURE))
        }
    }
}

/// Run a read-only ledger command and render its reply.
fn ledger_command<F>(
    state: &AppState,
    caller: &Caller,
    command: &str,
    failure_message: &str,
    f: F,
) -> InteractionResponse
where
    F: FnOnce(&cutie_store::Database) -> Result<Reply, CommandError>,
{
    match state.with_ledger(f) {
        Ok(reply) => InteractionResponse::ephemeral(render(&state.styles, caller, &reply)),
        Err(err) => failure(command, &err, failure_message),
    }
}

async fn give(state: &AppState, caller: &Caller, data: &InteractionData) -> InteractionResponse {
    const FAILED: &str = "Failed to give cute points";

    let (Some(points), Some(target)) = (data.option_i64("points"), data.option_user("user")) else {
        let err = CommandError::InvalidArguments("points and user are required".into());
        return failure(commands::GIVE, &err, FAILED);
    };

    let reply = match state.with_ledger(|db| {
        commands::give(db, &state.permissions, caller, &target, points)
    }) {
        Ok(reply) => reply,
        Err(err) => return failure(commands::GIVE, &err, FAILED),
    };

    audit(state, caller, &target, points);

    InteractionResponse::ephemeral(render(&state.styles, caller, &reply))
}

/// Post the give notice to the audit channel in the background.  The reply
/// never waits on it and a failed post never fails the give itself.
fn audit(state: &AppState, caller: &Caller, target: &Target, points: i64) {
    let Some(channel_id) = state.config.audit_channel_id else {
        warn!("CUTE_CHANNEL not set, skipping audit notice");
        return;
    };

    let line = commands::audit_line(caller, target, points);
    let platform = Arc::clone(&state.platform);
    tokio::spawn(async move {
        if let Err(e) = platform.post_message(channel_id, &line).await {
            error!(error = %e, channel_id, "failed to post audit notice");
        }
    });
}

fn profession(state: &AppState, caller: &Caller, data: &InteractionData) -> InteractionResponse {
    let post = match ProfessionPost::from_options(data) {
        Ok(post) => post,
        Err(e @ ProfessionError::TooLong { .. }) => {
            let message = format!("The {e}, please shorten it");
            let err = CommandError::InvalidArguments(e.to_string());
            return failure(commands::PROFESSION, &err, &message);
        }
        Err(e) => {
            let err = CommandError::InvalidArguments(e.to_string());
            return failure(commands::PROFESSION, &err, GENERIC_FAILURE);
        }
    };

    debug!(caller = %caller.external_id, name = %post.name, "profession posted");

    InteractionResponse::public(
        state.styles.profession(caller, &post),
        vec![professions::delete_button(caller.external_id)],
    )
}

async fn sync(state: &AppState, caller: &Caller, interaction: &Interaction) -> InteractionResponse {
    const FAILED: &str = "Failed to sync commands";

    if !state.permissions.is_owner(caller) {
        return failure(commands::SYNC, &CommandError::Unauthorized, FAILED);
    }

    let Some(guild_id) = state.config.guild_id.or_else(|| interaction.guild()) else {
        let err = CommandError::InvalidArguments("no guild to sync".into());
        return failure(commands::SYNC, &err, FAILED);
    };

    match state
        .platform
        .overwrite_guild_commands(guild_id, &commands::definitions())
        .await
    {
        Ok(count) => {
            info!(guild_id, count, "synced commands");
            InteractionResponse::ephemeral(Embed::notice(&format!("Synced {count} commands")))
        }
        Err(e) => failure(commands::SYNC, &e.into(), FAILED),
    }
}

/// Handles the profession "Delete" button.  Clicks by anyone but the author
/// are acknowledged and ignored.
async fn run_component(state: &AppState, interaction: &Interaction) -> InteractionResponse {
    let Some(owner) = interaction.custom_id().and_then(professions::delete_owner) else {
        debug!(custom_id = ?interaction.custom_id(), "ignoring unknown component");
        return InteractionResponse::acknowledge();
    };

    let Some(caller) = interaction.caller() else {
        return InteractionResponse::acknowledge();
    };

    if caller.external_id != owner {
        debug!(caller = %caller.external_id, owner = %owner, "delete clicked by someone else");
        return InteractionResponse::acknowledge();
    }

    let target = interaction.message.as_ref().and_then(|message| {
        let channel = message
            .channel_id
            .as_deref()
            .or(interaction.channel_id.as_deref())?;
        Some((channel.parse::<u64>().ok()?, message.id.parse::<u64>().ok()?))
    });

    let Some((channel_id, message_id)) = target else {
        let err = CommandError::InvalidArguments("component without a message".into());
        return failure("profession_delete", &err, GENERIC_FAILURE);
    };

    match state.platform.delete_message(channel_id, message_id).await {
        Ok(()) => InteractionResponse::acknowledge(),
        Err(e) => failure("profession_delete", &e.into(), GENERIC_FAILURE),
    }
}

fn render(styles: &StyleBook, caller: &Caller, reply: &Reply) -> Embed {
    match reply {
        Reply::Given { target, points, .. } => styles.given(caller, target, *points),
        Reply::Points { points } => styles.points(caller, *points),
        Reply::Leaderboard { entries } => styles.leaderboard(caller, entries),
    }
}

fn failure(command: &str, err: &CommandError, message: &str) -> InteractionResponse {
    match err {
        CommandError::Unauthorized => {
            info!(command, "command refused");
            return InteractionResponse::ephemeral(Embed::error(NOT_ALLOWED));
        }
        CommandError::InvalidArguments(reason) => {
            warn!(command, reason = %reason, "bad command arguments");
        }
        other => {
            error!(command, error = %other, "command failed");
        }
    }
    InteractionResponse::ephemeral(Embed::error(message))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::api::testing::{state, AUDIT_CHANNEL, GIVER_ROLE, GUILD, OWNER};
    use crate::discord::testing::{Call, RecordingPlatform};
    use crate::discord::{Platform, PlatformError};
    use crate::interaction::{DEFERRED_UPDATE_MESSAGE, EPHEMERAL};

    /// Records like [`RecordingPlatform`] but takes `delay` to post a message.
    struct SlowPlatform {
        inner: RecordingPlatform,
        delay: Duration,
    }

    #[async_trait]
    impl Platform for SlowPlatform {
        async fn post_message(&self, channel_id: u64, content: &str) -> Result<(), PlatformError> {
            tokio::time::sleep(self.delay).await;
            self.inner.post_message(channel_id, content).await
        }

        async fn overwrite_guild_commands(
            &self,
            guild_id: u64,
            commands: &[Value],
        ) -> Result<usize, PlatformError> {
            self.inner.overwrite_guild_commands(guild_id, commands).await
        }

        async fn delete_message(
            &self,
            channel_id: u64,
            message_id: u64,
        ) -> Result<(), PlatformError> {
            self.inner.delete_message(channel_id, message_id).await
        }
    }

    /// Wait for background audit posts to land.
    async fn settle(platform: &RecordingPlatform, expected: usize) {
        for _ in 0..200 {
            if platform.calls().len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn member(id: &str, username: &str, roles: &[u64]) -> Value {
        json!({
            "user": { "id": id, "username": username },
            "roles": roles.iter().map(|r| r.to_string()).collect::<Vec<_>>()
        })
    }

    fn command(name: &str, member: Value, options: Value, resolved: Value) -> Interaction {
        serde_json::from_value(json!({
            "id": "10",
            "application_id": "2",
            "type": APPLICATION_COMMAND,
            "token": "tok",
            "guild_id": GUILD.to_string(),
            "channel_id": "901",
            "member": member,
            "data": { "name": name, "options": options, "resolved": resolved }
        }))
        .unwrap()
    }

    fn view(id: &str, username: &str) -> Interaction {
        command("cute_points", member(id, username, &[]), json!([]), json!({}))
    }

    fn give_to(giver: Value, target_id: &str, target_name: &str, points: i64) -> Interaction {
        command(
            "cute_give",
            giver,
            json!([
                { "name": "points", "value": points },
                { "name": "user", "value": target_id }
            ]),
            json!({
                "users": { target_id: { "id": target_id, "username": target_name } }
            }),
        )
    }

    fn description(response: &InteractionResponse) -> String {
        response
            .embed()
            .and_then(|e| e.description.clone())
            .unwrap_or_default()
    }

    fn is_error(response: &InteractionResponse) -> bool {
        response.embed().and_then(|e| e.title.as_deref()) == Some("Error")
    }

    #[tokio::test]
    async fn points_give_and_leaderboard_flow() {
        let platform = Arc::new(RecordingPlatform::default());
        let (state, _) = state(platform.clone());
        let bob = member("222", "bob", &[GIVER_ROLE]);

        let first = dispatch(&state, &view("111", "Alice")).await.unwrap();
        assert!(description(&first).contains("**0**"));
        assert_eq!(first.data.as_ref().unwrap().flags, Some(EPHEMERAL));

        let given = dispatch(&state, &give_to(bob, "111", "Alice", 25)).await.unwrap();
        assert!(!is_error(&given));
        assert!(description(&given).contains("25"));
        settle(&platform, 1).await;
        assert_eq!(
            platform.calls(),
            vec![Call::Post {
                channel_id: AUDIT_CHANNEL,
                content: "bob gave Alice 25 point(s)".into(),
            }]
        );

        let second = dispatch(&state, &view("111", "Alice")).await.unwrap();
        assert!(description(&second).contains("**25**"));

        let board = dispatch(
            &state,
            &command("cute_leaderboard", member("333", "carol", &[]), json!([]), json!({})),
        )
        .await
        .unwrap();
        let fields = &board.embed().unwrap().fields;
        assert!(fields[0].value.starts_with('1'));
        assert!(fields[1].value.starts_with("Alice"));
        assert!(fields[2].value.starts_with("25"));
    }

    #[tokio::test]
    async fn give_without_role_is_refused() {
        let platform = Arc::new(RecordingPlatform::default());
        let (state, _) = state(platform.clone());

        let response = dispatch(&state, &give_to(member("222", "bob", &[7]), "111", "Alice", 5))
            .await
            .unwrap();

        assert_eq!(description(&response), NOT_ALLOWED);
        assert!(platform.calls().is_empty());
        let count = state.with_ledger(|db| Ok(db.account_count()?)).unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn give_survives_audit_failure() {
        let platform = Arc::new(RecordingPlatform::failing());
        let (state, _) = state(platform.clone());

        let response = dispatch(
            &state,
            &give_to(member("222", "bob", &[GIVER_ROLE]), "111", "Alice", 3),
        )
        .await
        .unwrap();

        assert!(!is_error(&response));
        settle(&platform, 1).await;
        assert_eq!(platform.calls().len(), 1);
    }

    #[tokio::test]
    async fn give_replies_before_audit_post_finishes() {
        let platform = Arc::new(SlowPlatform {
            inner: RecordingPlatform::default(),
            delay: Duration::from_secs(5),
        });
        let (state, _) = state(platform.clone());

        let response = tokio::time::timeout(
            Duration::from_secs(1),
            dispatch(
                &state,
                &give_to(member("222", "bob", &[GIVER_ROLE]), "111", "Alice", 3),
            ),
        )
        .await
        .expect("reply waited on the audit post")
        .unwrap();

        assert!(!is_error(&response));
        assert!(platform.inner.calls().is_empty());

        let seen = dispatch(&state, &view("111", "Alice")).await.unwrap();
        assert!(description(&seen).contains("**3**"));
    }

    #[tokio::test]
    async fn give_with_missing_options_fails_generically() {
        let (state, _) = state(Arc::new(RecordingPlatform::default()));

        let response = dispatch(
            &state,
            &command("cute_give", member("222", "bob", &[GIVER_ROLE]), json!([]), json!({})),
        )
        .await
        .unwrap();

        assert_eq!(description(&response), "Failed to give cute points");
    }

    #[tokio::test]
    async fn storage_failure_hides_detail() {
        let (state, _) = state(Arc::new(RecordingPlatform::default()));
        state
            .with_ledger(|db| {
                db.conn()
                    .execute_batch("DROP TABLE cute_points")
                    .map_err(cutie_store::StoreError::from)?;
                Ok(())
            })
            .unwrap();

        let response = dispatch(&state, &view("111", "Alice")).await.unwrap();

        assert!(is_error(&response));
        assert_eq!(description(&response), "Failed to retrieve your cute points");
    }

    #[tokio::test]
    async fn other_guild_is_refused() {
        let (state, _) = state(Arc::new(RecordingPlatform::default()));
        let mut interaction = view("111", "Alice");
        interaction.guild_id = Some("12345".into());

        let response = dispatch(&state, &interaction).await.unwrap();
        assert_eq!(description(&response), WRONG_GUILD);
    }

    #[tokio::test]
    async fn ping_and_unknown_types() {
        let (state, _) = state(Arc::new(RecordingPlatform::default()));
        let mut interaction = view("111", "Alice");

        interaction.kind = PING;
        let pong = dispatch(&state, &interaction).await.unwrap();
        assert_eq!(pong.kind, crate::interaction::PONG);

        interaction.kind = 9;
        assert!(matches!(
            dispatch(&state, &interaction).await,
            Err(ServerError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn sync_is_owner_only() {
        let platform = Arc::new(RecordingPlatform::default());
        let (state, _) = state(platform.clone());

        let refused = dispatch(
            &state,
            &command("cute_sync", member("222", "bob", &[GIVER_ROLE]), json!([]), json!({})),
        )
        .await
        .unwrap();
        assert_eq!(description(&refused), NOT_ALLOWED);
        assert!(platform.calls().is_empty());

        let owner = OWNER.to_string();
        let synced = dispatch(
            &state,
            &command("cute_sync", member(&owner, "owner", &[]), json!([]), json!({})),
        )
        .await
        .unwrap();
        assert_eq!(description(&synced), "Synced 5 commands");
        assert_eq!(
            platform.calls(),
            vec![Call::Overwrite {
                guild_id: GUILD,
                count: 5
            }]
        );
    }

    #[tokio::test]
    async fn oversized_profession_gets_error_card() {
        let (state, _) = state(Arc::new(RecordingPlatform::default()));
        let long = "x".repeat(professions::FIELD_LIMIT + 1);

        let response = dispatch(
            &state,
            &command(
                "profession",
                member("111", "alice", &[]),
                json!([
                    { "name": "name", "value": "Art" },
                    { "name": "description", "value": long },
                    { "name": "requirements", "value": "ref" }
                ]),
                json!({}),
            ),
        )
        .await
        .unwrap();

        assert!(is_error(&response));
        assert_eq!(response.data.as_ref().unwrap().flags, Some(EPHEMERAL));
        assert!(description(&response).starts_with("The description is longer than 1024"));
    }

    #[tokio::test]
    async fn profession_post_and_delete() {
        let platform = Arc::new(RecordingPlatform::default());
        let (state, _) = state(platform.clone());

        let posted = dispatch(
            &state,
            &command(
                "profession",
                member("111", "alice", &[]),
                json!([
                    { "name": "name", "value": "Art" },
                    { "name": "description", "value": "Sketches" },
                    { "name": "requirements", "value": "ref,budget" }
                ]),
                json!({}),
            ),
        )
        .await
        .unwrap();

        let data = posted.data.as_ref().unwrap();
        assert_eq!(data.flags, None);
        let custom_id = data.components[0]["components"][0]["custom_id"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(posted.embed().unwrap().fields[1].value, "ref\nbudget");

        let click = |user: &str| -> Interaction {
            serde_json::from_value(json!({
                "id": "11",
                "application_id": "2",
                "type": MESSAGE_COMPONENT,
                "token": "tok2",
                "guild_id": GUILD.to_string(),
                "channel_id": "901",
                "member": member(user, "someone", &[]),
                "message": { "id": "5555", "channel_id": "901" },
                "data": { "custom_id": custom_id }
            }))
            .unwrap()
        };

        let ignored = dispatch(&state, &click("222")).await.unwrap();
        assert_eq!(ignored.kind, DEFERRED_UPDATE_MESSAGE);
        assert!(platform.calls().is_empty());

        let deleted = dispatch(&state, &click("111")).await.unwrap();
        assert_eq!(deleted.kind, DEFERRED_UPDATE_MESSAGE);
        assert_eq!(
            platform.calls(),
            vec![Call::Delete {
                channel_id: 901,
                message_id: 5555
            }]
        );
    }
}
