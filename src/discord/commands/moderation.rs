// Moderation slash commands. Permission gates are the platform's
// (checked by poise before dispatch); everything else happens in the
// router so the free-text forms behave identically.

use super::run_slash;
use crate::core::router::NamedArgs;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Ban a user from the server.
#[poise::command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "The user to ban"] user: serenity::User,
    #[description = "Reason for the ban"] reason: Option<String>,
) -> Result<(), Error> {
    run_slash(
        ctx,
        "ban",
        NamedArgs::new()
            .user("user", user.id.get())
            .opt_string("reason", reason),
    )
    .await
}

/// Kick a user from the server.
#[poise::command(slash_command, guild_only, required_permissions = "KICK_MEMBERS")]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "The user to kick"] user: serenity::User,
    #[description = "Reason for the kick"] reason: Option<String>,
) -> Result<(), Error> {
    run_slash(
        ctx,
        "kick",
        NamedArgs::new()
            .user("user", user.id.get())
            .opt_string("reason", reason),
    )
    .await
}

/// Lift a ban by user id.
#[poise::command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn unban(
    ctx: Context<'_>,
    #[description = "The user ID to unban"] user_id: String,
    #[description = "Reason for the unban"] reason: Option<String>,
) -> Result<(), Error> {
    run_slash(
        ctx,
        "unban",
        NamedArgs::new()
            .string("user_id", user_id)
            .opt_string("reason", reason),
    )
    .await
}

/// Time a user out for a number of minutes.
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn timeout(
    ctx: Context<'_>,
    #[description = "The user to time out"] user: serenity::User,
    #[description = "Duration in minutes"] minutes: i64,
    #[description = "Reason for the timeout"] reason: Option<String>,
) -> Result<(), Error> {
    run_slash(
        ctx,
        "timeout",
        NamedArgs::new()
            .user("user", user.id.get())
            .int("minutes", minutes)
            .opt_string("reason", reason),
    )
    .await
}

/// Delete recent messages from this channel.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn clean(
    ctx: Context<'_>,
    #[description = "Number of messages to delete (default 10, max 100)"] count: Option<i64>,
) -> Result<(), Error> {
    run_slash(ctx, "clean", NamedArgs::new().opt_int("count", count)).await
}

/// Show a moderator's action counts.
#[poise::command(slash_command, guild_only, rename = "mod-stats")]
pub async fn mod_stats(
    ctx: Context<'_>,
    #[description = "The moderator to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    run_slash(
        ctx,
        "mod-stats",
        NamedArgs::new().opt_user("user", user.map(|u| u.id.get())),
    )
    .await
}
