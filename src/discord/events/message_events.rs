// Message-event handling: DM auto-replies, free-text command
// dispatch, and XP for ordinary chat.
//
// A message takes exactly one of three paths. DMs get the configured
// auto-reply. Guild messages starting with the guild's prefix go
// through the same router the slash commands use. Everything else is
// ordinary chat and may earn XP.

use crate::core::gateway::MessagingGateway;
use crate::core::responses as formatter;
use crate::core::router::{bind_prefix, CommandOrigin};
use crate::discord::gateway::SerenityGateway;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;
use std::time::Duration;

/// How long a transient confirmation stays up before it is deleted.
const TRANSIENT_REPLY_TTL: Duration = Duration::from_secs(3);

pub async fn handle_message(
    ctx: &serenity::Context,
    data: &Data,
    message: &serenity::Message,
) -> Result<(), Error> {
    // Ignore bots, including ourselves.
    if message.author.bot {
        return Ok(());
    }

    let gateway = SerenityGateway::new(ctx.http.clone());

    let Some(guild_id) = message.guild_id else {
        if let Err(error) = gateway
            .send_text(message.channel_id.get(), &data.config.dm_message)
            .await
        {
            tracing::warn!(%error, "Failed to send DM auto-reply");
        }
        return Ok(());
    };
    let guild_id = guild_id.get();

    let prefix = match data.settings.effective_prefix(guild_id).await {
        Ok(prefix) => prefix,
        Err(error) => {
            tracing::error!(%error, guild_id, "Failed to load guild prefix");
            data.config.default_prefix.clone()
        }
    };

    if let Some(rest) = message.content.strip_prefix(&prefix) {
        handle_prefix_command(&gateway, data, message, guild_id, rest).await;
        return Ok(());
    }

    award_message_xp(&gateway, data, message, guild_id).await;
    Ok(())
}

async fn handle_prefix_command(
    gateway: &SerenityGateway,
    data: &Data,
    message: &serenity::Message,
    guild_id: u64,
    rest: &str,
) {
    // A bare prefix ("." on its own) is not a command.
    let Some((name, remainder)) = split_command(rest) else {
        return;
    };
    let name = name.to_lowercase();

    let origin = CommandOrigin {
        guild_id: Some(guild_id),
        channel_id: message.channel_id.get(),
        invoker_id: message.author.id.get(),
        trigger_message_id: Some(message.id.get()),
    };

    let outcome = match bind_prefix(&name, remainder) {
        Ok(invocation) => data.router.dispatch(gateway, &origin, invocation).await,
        Err(error) => Err(error),
    };

    match outcome {
        Ok(reply) => match gateway.send_text(origin.channel_id, &reply.text).await {
            Ok(reply_id) if reply.transient => {
                tokio::time::sleep(TRANSIENT_REPLY_TTL).await;
                if let Err(error) = gateway
                    .delete_messages(origin.channel_id, &[reply_id])
                    .await
                {
                    tracing::warn!(%error, "Failed to delete transient confirmation");
                }
            }
            Ok(_) => {}
            Err(error) => tracing::warn!(%error, "Failed to send command reply"),
        },
        Err(error) => {
            tracing::warn!(command = %name, %error, "Command failed");
            if let Err(send_error) = gateway
                .send_text(origin.channel_id, &formatter::error_text(&error))
                .await
            {
                tracing::warn!(%send_error, "Failed to send error reply");
            }
        }
    }
}

async fn award_message_xp(
    gateway: &SerenityGateway,
    data: &Data,
    message: &serenity::Message,
    guild_id: u64,
) {
    match data.settings.leveling_enabled(guild_id).await {
        Ok(true) => {}
        Ok(false) => return,
        Err(error) => {
            tracing::error!(%error, guild_id, "Failed to load leveling flag");
            return;
        }
    }

    match data
        .leveling
        .award_message_xp(message.author.id.get(), guild_id)
        .await
    {
        Ok(Some(level_up)) => {
            tracing::info!(
                user_id = level_up.user_id,
                guild_id = level_up.guild_id,
                old_level = level_up.old_level,
                new_level = level_up.new_level,
                total_xp = level_up.total_xp,
                "User leveled up"
            );
            if let Err(error) = gateway
                .send_text(
                    message.channel_id.get(),
                    &formatter::level_up(level_up.user_id, level_up.new_level),
                )
                .await
            {
                tracing::warn!(%error, "Failed to announce level-up");
            }
        }
        Ok(None) => {}
        Err(error) => tracing::error!(%error, "Failed to award message XP"),
    }
}

fn split_command(rest: &str) -> Option<(&str, &str)> {
    let rest = rest.trim_start();
    if rest.is_empty() {
        return None;
    }
    match rest.find(char::is_whitespace) {
        Some(pos) => {
            let (name, remainder) = rest.split_at(pos);
            Some((name, remainder))
        }
        None => Some((rest, "")),
    }
}
