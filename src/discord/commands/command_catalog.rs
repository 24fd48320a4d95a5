// Discord commands module. Each feature gets its own command file;
// the shared slash-dispatch plumbing lives here.

pub mod fun;
pub mod moderation;
pub mod utility;

use crate::core::responses as formatter;
use crate::core::router::{bind_structured, CommandOrigin, NamedArgs};
use crate::discord::gateway::SerenityGateway;
use crate::discord::{Context, Error};

/// Bind a slash command's named arguments through the router and send
/// back whatever it rendered.
///
/// Every slash command funnels through here, so the structured path
/// stays symmetrical with the free-text path in the event handler:
/// same binder table, same dispatch, same error rendering.
pub(crate) async fn run_slash(
    ctx: Context<'_>,
    name: &str,
    args: NamedArgs,
) -> Result<(), Error> {
    let origin = CommandOrigin {
        guild_id: ctx.guild_id().map(|id| id.get()),
        channel_id: ctx.channel_id().get(),
        invoker_id: ctx.author().id.get(),
        // Interactions don't leave a message in the channel.
        trigger_message_id: None,
    };
    let gateway = SerenityGateway::new(ctx.serenity_context().http.clone());

    let outcome = match bind_structured(name, args) {
        Ok(invocation) => {
            ctx.data()
                .router
                .dispatch(&gateway, &origin, invocation)
                .await
        }
        Err(error) => Err(error),
    };

    match outcome {
        Ok(reply) => {
            ctx.send(
                poise::CreateReply::default()
                    .content(reply.text)
                    .ephemeral(reply.private),
            )
            .await?;
        }
        Err(error) => {
            tracing::warn!(command = name, %error, "Command failed");
            ctx.send(
                poise::CreateReply::default()
                    .content(formatter::error_text(&error))
                    .ephemeral(true),
            )
            .await?;
        }
    }

    Ok(())
}
