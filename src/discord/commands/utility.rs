// Utility and leveling slash commands. Thin: pack the named args,
// hand off to the router.

use super::run_slash;
use crate::core::router::NamedArgs;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Check that the bot is responding.
#[poise::command(slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    run_slash(ctx, "ping", NamedArgs::new()).await
}

/// Show the command list.
#[poise::command(slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    run_slash(ctx, "help", NamedArgs::new()).await
}

/// Where to find the bot's source code.
#[poise::command(slash_command)]
pub async fn source(ctx: Context<'_>) -> Result<(), Error> {
    run_slash(ctx, "source", NamedArgs::new()).await
}

/// Change the command prefix for this server.
#[poise::command(slash_command, guild_only)]
pub async fn prefix(
    ctx: Context<'_>,
    #[description = "The new prefix (at most 5 characters)"] prefix: String,
) -> Result<(), Error> {
    run_slash(ctx, "prefix", NamedArgs::new().string("prefix", prefix)).await
}

/// Check XP and level.
#[poise::command(slash_command, guild_only)]
pub async fn xp(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    run_slash(
        ctx,
        "xp",
        NamedArgs::new().opt_user("user", user.map(|u| u.id.get())),
    )
    .await
}

/// Show the server's XP rankings.
#[poise::command(slash_command, guild_only)]
pub async fn leaderboard(ctx: Context<'_>) -> Result<(), Error> {
    run_slash(ctx, "leaderboard", NamedArgs::new()).await
}
